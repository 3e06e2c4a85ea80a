//! Durable key-value store.
//!
//! A flat map of string keys to `serde_json::Value`, optionally backed by a
//! JSON file. File-backed stores are write-through: every mutation that
//! changes a value rewrites the file atomically before returning, so a
//! process killed mid-pass restarts with everything written so far.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::StateError;

/// Alias for stored values.
pub type StoreValue = Value;

#[derive(Debug, Clone)]
pub struct StateStore {
    data: BTreeMap<String, StoreValue>,
    /// Backing file, `None` for purely in-memory stores.
    path: Option<PathBuf>,
}

impl StateStore {
    /// Create an empty store that is never persisted.
    pub fn in_memory() -> Self {
        StateStore {
            data: BTreeMap::new(),
            path: None,
        }
    }

    /// Open a store backed by `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, StateError> {
        let data = read_file(path)?;
        Ok(StateStore {
            data,
            path: Some(path.to_path_buf()),
        })
    }

    /// Re-read the backing file, discarding in-memory contents.
    pub fn reload(&mut self) -> Result<(), StateError> {
        if let Some(path) = &self.path {
            self.data = read_file(path)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&StoreValue> {
        self.data.get(key)
    }

    /// Get a value and decode it into `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        match self.data.get(key) {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|source| StateError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// SET a value. Writing an identical value is a no-op and does not touch
    /// the backing file.
    pub fn set(&mut self, key: &str, value: StoreValue) -> Result<(), StateError> {
        if self.data.get(key) == Some(&value) {
            return Ok(());
        }
        self.data.insert(key.to_string(), value);
        self.flush()
    }

    /// Encode `value` and SET it.
    pub fn put<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StateError> {
        let encoded = serde_json::to_value(value).map_err(|source| StateError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set(key, encoded)
    }

    /// Remove a value. Removing a missing key is a no-op.
    pub fn remove(&mut self, key: &str) -> Result<Option<StoreValue>, StateError> {
        let removed = self.data.remove(key);
        if removed.is_some() {
            self.flush()?;
        }
        Ok(removed)
    }

    /// All keys beginning with `prefix`, in sorted order.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<&str> {
        self.data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .map(|k| k.as_str())
            .collect()
    }

    pub fn export(&self) -> &BTreeMap<String, StoreValue> {
        &self.data
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write the whole map to the backing file via a temp file + rename.
    pub fn flush(&self) -> Result<(), StateError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let write_err = |source| StateError::Write {
            path: path.clone(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(write_err)?;
        let bytes = serde_json::to_vec_pretty(&self.data).map_err(|source| StateError::Encode {
            key: "*".to_string(),
            source,
        })?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&bytes).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn read_file(path: &Path) -> Result<BTreeMap<String, StoreValue>, StateError> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StateError::Corrupt {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(source) => Err(StateError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
