//! Convergence engine: an ordered rule table evaluated against the live gate
//! set once per trigger.
//!
//! The `rule` module declares rules and the per-pass `Context`. The `engine`
//! module walks the table and produces a `PassReport`.

pub mod engine;
pub mod rule;

pub use engine::{PassReport, RuleReport, RulesEngine};
pub use rule::{Context, Outcome, Rule, RuleBody};
