//! Convergence engine for a Kubernetes master node.
//!
//! Each trigger from the lifecycle runtime runs one pass over an ordered
//! rule table. Rules coordinate only through persisted gates; per-service
//! daemon flags accumulate in a `FlagManager`; fingerprints skip work whose
//! inputs did not change.

pub mod addons;
pub mod convergence;
pub mod error;
pub mod flags;
pub mod infrastructure;
pub mod master;
pub mod settings;
pub mod state;
pub mod sys;
pub mod types;

#[cfg(test)]
mod testing;

pub use convergence::{Outcome, PassReport};
pub use error::{CommandError, ConfigError, ConvergeError, RenderError, StateError};
pub use sys::Sys;
