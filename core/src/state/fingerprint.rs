//! Change fingerprints for relation data and other rule inputs.
//!
//! A fingerprint is the SHA-256 of a canonical JSON encoding of the payload.
//! Object keys are sorted before hashing so mapping payloads compare equal
//! regardless of insertion order.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::store::StateStore;
use crate::error::StateError;

const PREFIX: &str = "fingerprint.";

/// Hash `payload` into a lowercase hex digest.
pub fn fingerprint<T: Serialize + ?Sized>(payload: &T) -> Result<String, StateError> {
    let value = serde_json::to_value(payload).map_err(|source| StateError::Encode {
        key: "fingerprint payload".to_string(),
        source,
    })?;
    let canonical = canonicalize(value);
    let bytes = serde_json::to_vec(&canonical).map_err(|source| StateError::Encode {
        key: "fingerprint payload".to_string(),
        source,
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// View over the fingerprint entries in a `StateStore`.
pub struct FingerprintStore<'a> {
    store: &'a mut StateStore,
}

impl<'a> FingerprintStore<'a> {
    pub fn new(store: &'a mut StateStore) -> Self {
        FingerprintStore { store }
    }

    /// Record the hash of `payload` under `name` and report whether it
    /// differs from the previous observation. A first observation counts as
    /// changed. The stored hash is updated either way.
    pub fn observe<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        payload: &T,
    ) -> Result<bool, StateError> {
        let key = format!("{}{}", PREFIX, name);
        let digest = fingerprint(payload)?;
        let previous = self.store.get(&key).and_then(|v| v.as_str()).map(str::to_owned);
        self.store.set(&key, Value::String(digest.clone()))?;
        Ok(previous.as_deref() != Some(digest.as_str()))
    }

    /// Drop the stored hash so the next observation reports a change.
    pub fn forget(&mut self, name: &str) -> Result<(), StateError> {
        self.store.remove(&format!("{}{}", PREFIX, name))?;
        Ok(())
    }
}
