use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::Gate;

/// The set of gates currently raised.
///
/// Stored by name so that a store written by a newer build with extra gates
/// still loads; unknown names are carried along untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct GateSet {
    names: BTreeSet<String>,
}

impl GateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise a gate. Returns whether it was previously clear.
    pub fn set(&mut self, gate: Gate) -> bool {
        self.names.insert(gate.name().to_string())
    }

    /// Clear a gate. Returns whether it was previously set.
    pub fn clear(&mut self, gate: Gate) -> bool {
        self.names.remove(gate.name())
    }

    pub fn is_set(&self, gate: Gate) -> bool {
        self.names.contains(gate.name())
    }

    /// Known gates currently raised, in name order.
    pub fn iter(&self) -> impl Iterator<Item = Gate> + '_ {
        self.names.iter().filter_map(|n| n.parse().ok())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
