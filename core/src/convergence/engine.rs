//! Rule evaluation.
//!
//! One pass walks the rule table in order. Gate conditions are read from the
//! live state, so a rule sees whatever earlier rules in the same pass did.
//! A body error aborts the pass; gates already raised stay raised.

use serde::Serialize;
use tracing::{debug, info};

use super::rule::{Context, Outcome, Rule};
use crate::error::ConvergeError;
use crate::types::Publication;

/// Result of one rule firing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleReport {
    pub rule: &'static str,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Summary of a convergence pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
    pub fired: Vec<RuleReport>,
    pub skipped: Vec<&'static str>,
    pub publications: Vec<Publication>,
}

impl PassReport {
    pub fn fired_names(&self) -> Vec<&'static str> {
        self.fired.iter().map(|r| r.rule).collect()
    }

    pub fn outcome_of(&self, rule: &str) -> Option<&Outcome> {
        self.fired.iter().find(|r| r.rule == rule).map(|r| &r.outcome)
    }
}

pub struct RulesEngine {
    rules: Vec<Rule>,
}

impl RulesEngine {
    pub fn new(rules: Vec<Rule>) -> Self {
        RulesEngine { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Run one pass over every rule.
    pub fn evaluate(&self, ctx: &mut Context<'_>) -> Result<PassReport, ConvergeError> {
        ctx.state.sync_relation_gates(ctx.relations)?;

        let mut report = PassReport::default();
        for rule in &self.rules {
            let gates = ctx.state.gates()?;
            if !rule.inputs_present(ctx.relations) || !rule.gates_satisfied(&gates) {
                report.skipped.push(rule.name);
                continue;
            }
            debug!(rule = rule.name, "firing");
            let outcome = (rule.body)(ctx).map_err(|e| ConvergeError::Rule {
                rule: rule.name,
                source: Box::new(e),
            })?;
            if let Outcome::Waiting(reason) = &outcome {
                info!(rule = rule.name, reason = %reason, "waiting");
            }
            report.fired.push(RuleReport {
                rule: rule.name,
                outcome,
            });
        }
        report.publications = std::mem::take(&mut ctx.publications);
        Ok(report)
    }
}
