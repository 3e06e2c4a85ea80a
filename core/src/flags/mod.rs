//! Flag accumulation: the pure `FlagSet` and its persisted `FlagManager`
//! view.

pub mod manager;
pub mod set;

pub use manager::FlagManager;
pub use set::{FlagEntry, FlagMode, FlagSet, FlagValue};
