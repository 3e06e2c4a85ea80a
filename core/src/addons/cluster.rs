//! Read-only cluster queries through `kubectl`.

use serde::Deserialize;
use tracing::warn;

use crate::error::CommandError;
use crate::infrastructure::CommandRunner;

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatus {
    #[serde(default)]
    phase: String,
}

/// Number of registered nodes.
pub fn node_count(runner: &dyn CommandRunner) -> Result<usize, CommandError> {
    let output = runner.run("kubectl", &["get", "nodes", "-o", "name"])?;
    Ok(output.lines().filter(|l| !l.trim().is_empty()).count())
}

/// True when every pod in `kube-system` reports phase `Running`. A failed
/// query or unparseable output counts as not running.
pub fn all_kube_system_pods_running(runner: &dyn CommandRunner) -> bool {
    let output = match runner.run("kubectl", &["get", "po", "-n", "kube-system", "-o", "json"]) {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "failed to get kube-system pod status");
            return false;
        }
    };
    match serde_json::from_str::<PodList>(&output) {
        Ok(pods) => pods.items.iter().all(|p| p.status.phase == "Running"),
        Err(e) => {
            warn!(error = %e, "unreadable kube-system pod list");
            false
        }
    }
}
