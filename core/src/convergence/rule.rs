//! Rule declarations and the context a rule body runs against.

use serde::Serialize;
use tracing::info;

use crate::error::ConvergeError;
use crate::infrastructure::host;
use crate::infrastructure::{CommandRunner, Renderer};
use crate::state::{ClusterState, GateSet};
use crate::types::{Gate, Publication, RelationKind, RelationSnapshot, Settings, Status, StatusLevel};

/// What a rule body reports back to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    /// The body did its work and updated gates or flags accordingly.
    Converged,
    /// Nothing to do: inputs unchanged or a body-level condition not met.
    Unchanged,
    /// Transient failure or missing data. Gates are left alone so the rule
    /// fires again on the next trigger.
    Waiting(String),
}

pub type RuleBody = fn(&mut Context<'_>) -> Result<Outcome, ConvergeError>;

/// A guarded action.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    /// Gates that must all be set.
    pub when: &'static [Gate],
    /// Gates that must all be clear.
    pub when_not: &'static [Gate],
    /// Relations that must be present in the snapshot.
    pub inputs: &'static [RelationKind],
    pub body: RuleBody,
}

impl Rule {
    pub fn inputs_present(&self, relations: &RelationSnapshot) -> bool {
        self.inputs.iter().all(|kind| relations.has(*kind))
    }

    pub fn gates_satisfied(&self, gates: &GateSet) -> bool {
        self.when.iter().all(|g| gates.is_set(*g)) && self.when_not.iter().all(|g| !gates.is_set(*g))
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("when", &self.when)
            .field("when_not", &self.when_not)
            .field("inputs", &self.inputs)
            .finish()
    }
}

/// Everything a rule body may touch during one pass.
pub struct Context<'a> {
    pub state: &'a mut ClusterState,
    pub settings: &'a Settings,
    pub relations: &'a RelationSnapshot,
    pub runner: &'a dyn CommandRunner,
    pub renderer: &'a dyn Renderer,
    /// Relation data produced during this pass.
    pub publications: Vec<Publication>,
}

impl<'a> Context<'a> {
    pub fn new(
        state: &'a mut ClusterState,
        settings: &'a Settings,
        relations: &'a RelationSnapshot,
        runner: &'a dyn CommandRunner,
        renderer: &'a dyn Renderer,
    ) -> Self {
        Context {
            state,
            settings,
            relations,
            runner,
            renderer,
            publications: Vec::new(),
        }
    }

    /// Record the status locally and hand it to the runtime.
    pub fn set_status(&mut self, level: StatusLevel, message: &str) -> Result<(), ConvergeError> {
        let status = Status::new(level, message);
        info!(status = %status, "status");
        self.state.record_status(&status)?;
        host::status_set(self.runner, &status);
        Ok(())
    }

    pub fn set_gate(&mut self, gate: Gate) -> Result<(), ConvergeError> {
        if self.state.set_gate(gate)? {
            info!(gate = %gate, "gate set");
        }
        Ok(())
    }

    pub fn clear_gate(&mut self, gate: Gate) -> Result<(), ConvergeError> {
        if self.state.clear_gate(gate)? {
            info!(gate = %gate, "gate cleared");
        }
        Ok(())
    }

    pub fn publish(&mut self, publication: Publication) {
        self.publications.push(publication);
    }

    /// The effective service CIDR (frozen value wins over configuration).
    pub fn service_cidr(&self) -> String {
        self.state.service_cidr(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
        Ok(Outcome::Unchanged)
    }

    const RULE: Rule = Rule {
        name: "test",
        when: &[Gate::ComponentsStarted],
        when_not: &[Gate::KubeDnsAvailable],
        inputs: &[RelationKind::ClusterDns],
        body: noop,
    };

    #[test]
    fn gates_checked_both_ways() {
        let mut gates = GateSet::new();
        assert!(!RULE.gates_satisfied(&gates));
        gates.set(Gate::ComponentsStarted);
        assert!(RULE.gates_satisfied(&gates));
        gates.set(Gate::KubeDnsAvailable);
        assert!(!RULE.gates_satisfied(&gates));
    }

    #[test]
    fn inputs_checked_against_snapshot() {
        let mut rel = RelationSnapshot::default();
        assert!(!RULE.inputs_present(&rel));
        rel.cluster_dns_connected = true;
        assert!(RULE.inputs_present(&rel));
    }

    #[test]
    fn outcome_serializes_with_reason() {
        let json = serde_json::to_value(Outcome::Waiting("no key".into())).unwrap();
        assert_eq!(json["outcome"], "waiting");
        assert_eq!(json["reason"], "no key");
    }
}
