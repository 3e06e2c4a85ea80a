//! Loading boundary inputs from disk: operator settings (YAML) and the
//! relation snapshot for one trigger (JSON).

use std::path::Path;

use crate::error::ConfigError;
use crate::types::{RelationSnapshot, Settings};

/// Load settings from `path`. A missing file yields the defaults; fields
/// absent from the file keep their default values.
pub fn load(path: &Path) -> Result<Settings, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Settings {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a relation snapshot written by the runtime adapter.
pub fn load_relations(path: &Path) -> Result<RelationSnapshot, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Relations {
        path: path.to_path_buf(),
        source,
    })
}
