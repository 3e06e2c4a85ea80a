//! Per-service command-line flag accumulation.
//!
//! A `FlagSet` is an ordered list of `(name, value, mode)` entries. Normal
//! entries append, so several call sites may contribute the same flag and
//! every value is rendered. Strict entries replace everything stored under
//! their name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlagMode {
    Normal,
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagEntry {
    pub name: String,
    pub value: String,
    pub mode: FlagMode,
}

impl FlagEntry {
    /// `--name=value`.
    pub fn to_arg(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Stored form of a flag name: `v` and `--v` are the same flag.
fn canonical(name: &str) -> String {
    if name.starts_with('-') {
        name.to_string()
    } else {
        format!("--{}", name)
    }
}

/// A value and the mode it was added with, as exposed by `snapshot()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagValue {
    pub value: String,
    pub mode: FlagMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FlagSet {
    entries: Vec<FlagEntry>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a normal entry. Existing entries for `name` are kept.
    pub fn add(&mut self, name: &str, value: &str) {
        self.entries.push(FlagEntry {
            name: canonical(name),
            value: value.to_string(),
            mode: FlagMode::Normal,
        });
    }

    /// Drop every entry for `name`, whatever its mode, then insert one
    /// strict entry.
    pub fn add_strict(&mut self, name: &str, value: &str) {
        let name = canonical(name);
        self.entries.retain(|e| e.name != name);
        self.entries.push(FlagEntry {
            name,
            value: value.to_string(),
            mode: FlagMode::Strict,
        });
    }

    /// Remove the entries for `name` that were added with `mode`.
    /// Returns how many were removed; zero is not an error.
    pub fn remove(&mut self, name: &str, mode: FlagMode) -> usize {
        let name = canonical(name);
        let before = self.entries.len();
        self.entries.retain(|e| !(e.name == name && e.mode == mode));
        before - self.entries.len()
    }

    /// Whether any entry exists for `name`, in either mode.
    pub fn contains(&self, name: &str) -> bool {
        let name = canonical(name);
        self.entries.iter().any(|e| e.name == name)
    }

    /// Values for `name` in insertion order.
    pub fn values(&self, name: &str) -> Vec<&str> {
        let name = canonical(name);
        self.entries
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.value.as_str())
            .collect()
    }

    /// Render every entry as `--name=value`, space separated, in insertion
    /// order.
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(FlagEntry::to_arg)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Read-only view grouped by flag name.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<FlagValue>> {
        let mut map: BTreeMap<String, Vec<FlagValue>> = BTreeMap::new();
        for e in &self.entries {
            map.entry(e.name.clone()).or_default().push(FlagValue {
                value: e.value.clone(),
                mode: e.mode,
            });
        }
        map
    }

    pub fn entries(&self) -> &[FlagEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_is_stable() {
        let mut flags = FlagSet::new();
        flags.add("--v", "4");
        flags.add("--logtostderr", "true");
        let first = flags.serialize();
        assert_eq!(first, "--v=4 --logtostderr=true");
        assert_eq!(flags.serialize(), first);
    }

    #[test]
    fn strict_add_replaces_previous_strict() {
        let mut flags = FlagSet::new();
        flags.add_strict("--etcd-servers", "https://10.0.0.1:2379");
        flags.add_strict("--etcd-servers", "https://10.0.0.2:2379");
        let snap = flags.snapshot();
        assert_eq!(
            snap["--etcd-servers"],
            vec![FlagValue {
                value: "https://10.0.0.2:2379".into(),
                mode: FlagMode::Strict,
            }]
        );
    }

    #[test]
    fn strict_add_replaces_normal_entries() {
        let mut flags = FlagSet::new();
        flags.add("--admission-control", "NamespaceLifecycle");
        flags.add("--admission-control", "LimitRanger");
        flags.add_strict("--admission-control", "ServiceAccount");
        assert_eq!(flags.values("--admission-control"), vec!["ServiceAccount"]);
    }

    #[test]
    fn normal_add_keeps_duplicates() {
        let mut flags = FlagSet::new();
        flags.add("--v", "2");
        flags.add("--v", "4");
        assert_eq!(flags.values("--v"), vec!["2", "4"]);
        assert_eq!(flags.serialize(), "--v=2 --v=4");
    }

    #[test]
    fn remove_matches_mode_only() {
        let mut flags = FlagSet::new();
        flags.add("--etcd-servers", "a");
        assert_eq!(flags.remove("--etcd-servers", FlagMode::Strict), 0);
        assert!(flags.contains("--etcd-servers"));
        assert_eq!(flags.remove("--etcd-servers", FlagMode::Normal), 1);
        assert!(!flags.contains("--etcd-servers"));
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut flags = FlagSet::new();
        assert_eq!(flags.remove("--nope", FlagMode::Normal), 0);
        assert!(flags.is_empty());
    }

    #[test]
    fn strict_renders_like_normal() {
        let mut flags = FlagSet::new();
        flags.add_strict("--insecure-port", "8080");
        assert_eq!(flags.serialize(), "--insecure-port=8080");
    }

    #[test]
    fn bare_names_get_dashes() {
        let mut flags = FlagSet::new();
        flags.add("v", "2");
        assert_eq!(flags.serialize(), "--v=2");
    }

    #[test]
    fn bare_and_dashed_names_are_one_flag() {
        let mut flags = FlagSet::new();
        flags.add("--v", "2");
        flags.add_strict("v", "4");
        assert_eq!(flags.serialize(), "--v=4");
        assert_eq!(flags.values("v"), vec!["4"]);
        assert_eq!(flags.remove("--v", FlagMode::Strict), 1);
        assert!(!flags.contains("v"));
        assert!(flags.snapshot().is_empty());
    }

    #[test]
    fn insertion_order_survives_strict_replace() {
        let mut flags = FlagSet::new();
        flags.add_strict("--a", "1");
        flags.add("--b", "2");
        flags.add_strict("--a", "3");
        assert_eq!(flags.serialize(), "--b=2 --a=3");
    }

    #[test]
    fn persisted_form_round_trips() {
        let mut flags = FlagSet::new();
        flags.add("--v", "4");
        flags.add_strict("--etcd-servers", "https://10.0.0.1:2379");
        let json = serde_json::to_string(&flags).unwrap();
        let back: FlagSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back.serialize(), flags.serialize());
    }
}
