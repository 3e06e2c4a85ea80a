//! Process-wide convergence state: gates, flag sets, fingerprints, the frozen
//! service CIDR and the last status, all held in one `StateStore`.

pub mod fingerprint;
pub mod gates;
pub mod lock;
pub mod store;

use std::path::Path;

pub use fingerprint::FingerprintStore;
pub use gates::GateSet;
pub use lock::PassLock;
pub use store::{StateStore, StoreValue};

use tracing::warn;

use crate::error::StateError;
use crate::flags::{manager, FlagManager, FlagSet};
use crate::types::{Gate, RelationSnapshot, Settings, Status};

const GATES_KEY: &str = "gates";
const SERVICE_CIDR_KEY: &str = "kubernetes-master.service-cidr";
const STATUS_KEY: &str = "status";
const APP_VERSION_KEY: &str = "app-version";
const STATE_FILE: &str = "state.json";

/// The single explicit state container threaded through every rule.
#[derive(Debug, Clone, Default)]
pub struct ClusterState {
    store: StateStore,
}

impl ClusterState {
    pub fn in_memory() -> Self {
        ClusterState {
            store: StateStore::in_memory(),
        }
    }

    /// Open `<state_dir>/state.json`.
    pub fn open(state_dir: &Path) -> Result<Self, StateError> {
        Ok(ClusterState {
            store: StateStore::open(&state_dir.join(STATE_FILE))?,
        })
    }

    pub fn reload(&mut self) -> Result<(), StateError> {
        self.store.reload()
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    // -------------------------------------------------------------------
    // Gates
    // -------------------------------------------------------------------

    /// The raised gates. A malformed entry is an error so that no writer
    /// replaces it with a partial set.
    pub fn gates(&self) -> Result<GateSet, StateError> {
        Ok(self.store.get_as(GATES_KEY)?.unwrap_or_default())
    }

    /// Whether `gate` is raised. An unreadable gate entry reads as clear.
    pub fn is_set(&self, gate: Gate) -> bool {
        match self.gates() {
            Ok(gates) => gates.is_set(gate),
            Err(e) => {
                warn!(gate = %gate, error = %e, "cannot read gates");
                false
            }
        }
    }

    /// Raise `gate`. Returns whether it changed.
    pub fn set_gate(&mut self, gate: Gate) -> Result<bool, StateError> {
        let mut gates = self.gates()?;
        let changed = gates.set(gate);
        if changed {
            self.store.put(GATES_KEY, &gates)?;
        }
        Ok(changed)
    }

    /// Clear `gate`. Returns whether it changed.
    pub fn clear_gate(&mut self, gate: Gate) -> Result<bool, StateError> {
        let mut gates = self.gates()?;
        let changed = gates.clear(gate);
        if changed {
            self.store.put(GATES_KEY, &gates)?;
        }
        Ok(changed)
    }

    /// Bring the relation-mirror gates in line with `relations`.
    pub fn sync_relation_gates(&mut self, relations: &RelationSnapshot) -> Result<(), StateError> {
        let mut gates = self.gates()?;
        let mut changed = false;
        for (gate, available) in relations.availability() {
            changed |= if available {
                gates.set(gate)
            } else {
                gates.clear(gate)
            };
        }
        if changed {
            self.store.put(GATES_KEY, &gates)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Flags and fingerprints
    // -------------------------------------------------------------------

    pub fn flags(&mut self, service: &str) -> Result<FlagManager<'_>, StateError> {
        FlagManager::open(&mut self.store, service)
    }

    pub fn flag_set(&self, service: &str) -> Result<FlagSet, StateError> {
        manager::load(&self.store, service)
    }

    pub fn fingerprints(&mut self) -> FingerprintStore<'_> {
        FingerprintStore::new(&mut self.store)
    }

    // -------------------------------------------------------------------
    // Service CIDR
    // -------------------------------------------------------------------

    /// The frozen CIDR if one exists, otherwise the configured value.
    pub fn service_cidr(&self, settings: &Settings) -> String {
        self.frozen_service_cidr()
            .unwrap_or_else(|| settings.service_cidr.clone())
    }

    pub fn frozen_service_cidr(&self) -> Option<String> {
        self.store
            .get(SERVICE_CIDR_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    }

    /// Pin the service CIDR. The first freeze wins; later configuration
    /// changes never move a running apiserver.
    pub fn freeze_service_cidr(&mut self, settings: &Settings) -> Result<String, StateError> {
        let cidr = self.service_cidr(settings);
        self.store.put(SERVICE_CIDR_KEY, &cidr)?;
        Ok(cidr)
    }

    // -------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------

    pub fn status(&self) -> Option<Status> {
        self.store.get_as(STATUS_KEY).ok().flatten()
    }

    pub fn record_status(&mut self, status: &Status) -> Result<(), StateError> {
        self.store.put(STATUS_KEY, status)
    }

    pub fn app_version(&self) -> Option<String> {
        self.store
            .get(APP_VERSION_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    }

    pub fn record_app_version(&mut self, version: &str) -> Result<(), StateError> {
        self.store.put(APP_VERSION_KEY, version)
    }
}
