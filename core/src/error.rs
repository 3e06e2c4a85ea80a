use std::io;
use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// State errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot read state file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write state file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("corrupt state file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A stored value exists but does not have the expected shape.
    #[error("state key '{key}' holds an unexpected value: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
    #[error("cannot encode value for state key '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
    #[error("cannot lock {}: {source}", path.display())]
    Lock { path: PathBuf, source: io::Error },
    #[error("timed out acquiring lock {} after {timeout_ms}ms", path.display())]
    LockTimeout { path: PathBuf, timeout_ms: u64 },
}

// ---------------------------------------------------------------------------
// External command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to execute `{command}`: {source}")]
    Spawn { command: String, source: io::Error },
    #[error("`{command}` exited with status {code:?}: {stderr}")]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

// ---------------------------------------------------------------------------
// Template rendering errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot load templates from {}: {message}", dir.display())]
    Load { dir: PathBuf, message: String },
    #[error("cannot render template '{template}': {message}")]
    Template { template: String, message: String },
    #[error("cannot write rendered file {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid settings in {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid relation snapshot in {}: {source}", path.display())]
    Relations {
        path: PathBuf,
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Convergence errors
// ---------------------------------------------------------------------------

/// Errors that abort a convergence pass.
///
/// Transient conditions never surface here; rules report them as
/// `Outcome::Waiting` instead.
#[derive(Debug, Error)]
pub enum ConvergeError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid service CIDR '{0}'")]
    InvalidCidr(String),
    #[error("rule '{rule}' failed: {source}")]
    Rule {
        rule: &'static str,
        source: Box<ConvergeError>,
    },
}

impl ConvergeError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ConvergeError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error came from an external command exiting non-zero or
    /// failing to start.
    pub fn is_command_failure(&self) -> bool {
        match self {
            ConvergeError::Command(_) => true,
            ConvergeError::Rule { source, .. } => source.is_command_failure(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_is_detected_through_rule_wrapper() {
        let inner = ConvergeError::Command(CommandError::Failed {
            command: "kubectl apply".into(),
            code: Some(1),
            stderr: "connection refused".into(),
        });
        let wrapped = ConvergeError::Rule {
            rule: "start_kube_dns",
            source: Box::new(inner),
        };
        assert!(wrapped.is_command_failure());
        assert!(wrapped.to_string().contains("start_kube_dns"));
    }

    #[test]
    fn io_error_is_not_a_command_failure() {
        let err = ConvergeError::io(
            "/root/cdk/basic_auth.csv",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(!err.is_command_failure());
        assert!(err.to_string().contains("basic_auth.csv"));
    }
}
