use std::collections::BTreeMap;

use super::set::{FlagMode, FlagSet, FlagValue};
use crate::error::StateError;
use crate::state::StateStore;

const PREFIX: &str = "flags.";

fn key(service: &str) -> String {
    format!("{}{}", PREFIX, service)
}

/// Load the persisted flags for `service`, or an empty set.
pub fn load(store: &StateStore, service: &str) -> Result<FlagSet, StateError> {
    Ok(store.get_as(&key(service))?.unwrap_or_default())
}

/// Services with persisted flags.
pub fn services(store: &StateStore) -> Vec<String> {
    store
        .keys_with_prefix(PREFIX)
        .into_iter()
        .map(|k| k[PREFIX.len()..].to_string())
        .collect()
}

/// Persisted `FlagSet` for one service. Every mutation is written to the
/// store before the call returns.
pub struct FlagManager<'a> {
    store: &'a mut StateStore,
    service: String,
    flags: FlagSet,
}

impl<'a> FlagManager<'a> {
    pub fn open(store: &'a mut StateStore, service: &str) -> Result<Self, StateError> {
        let flags = load(store, service)?;
        Ok(FlagManager {
            store,
            service: service.to_string(),
            flags,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn add(&mut self, name: &str, value: &str) -> Result<(), StateError> {
        self.flags.add(name, value);
        self.save()
    }

    pub fn add_strict(&mut self, name: &str, value: &str) -> Result<(), StateError> {
        self.flags.add_strict(name, value);
        self.save()
    }

    pub fn remove(&mut self, name: &str) -> Result<(), StateError> {
        if self.flags.remove(name, FlagMode::Normal) > 0 {
            self.save()?;
        }
        Ok(())
    }

    pub fn remove_strict(&mut self, name: &str) -> Result<(), StateError> {
        if self.flags.remove(name, FlagMode::Strict) > 0 {
            self.save()?;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains(name)
    }

    pub fn serialize(&self) -> String {
        self.flags.serialize()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Vec<FlagValue>> {
        self.flags.snapshot()
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    fn save(&mut self) -> Result<(), StateError> {
        self.store.put(&key(&self.service), &self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn mutations_persist_across_managers() {
        let mut store = StateStore::in_memory();
        {
            let mut api = FlagManager::open(&mut store, "kube-apiserver").unwrap();
            api.add("--v", "4").unwrap();
            api.add_strict("--etcd-servers", "https://10.0.0.1:2379").unwrap();
        }
        let api = FlagManager::open(&mut store, "kube-apiserver").unwrap();
        assert_eq!(
            api.serialize(),
            "--v=4 --etcd-servers=https://10.0.0.1:2379"
        );
    }

    #[test]
    fn services_are_isolated() {
        let mut store = StateStore::in_memory();
        FlagManager::open(&mut store, "kube-scheduler")
            .unwrap()
            .add("--v", "2")
            .unwrap();
        let api = FlagManager::open(&mut store, "kube-apiserver").unwrap();
        assert!(api.flags().is_empty());
        assert_eq!(services(&store), vec!["kube-scheduler"]);
    }

    #[test]
    fn survives_process_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        {
            let mut store = StateStore::open(&path).unwrap();
            let mut ctl = FlagManager::open(&mut store, "kube-controller-manager").unwrap();
            ctl.add("--min-resync-period", "3m").unwrap();
        }
        let store = StateStore::open(&path).unwrap();
        assert_eq!(
            load(&store, "kube-controller-manager").unwrap().serialize(),
            "--min-resync-period=3m"
        );
    }

    #[test]
    fn removing_missing_flag_does_not_create_entry() {
        let mut store = StateStore::in_memory();
        FlagManager::open(&mut store, "kube-apiserver")
            .unwrap()
            .remove_strict("--etcd-servers")
            .unwrap();
        assert!(store.is_empty());
    }
}
