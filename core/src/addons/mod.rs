//! Addon lifecycle: manifests rendered into the addons directory and applied
//! to (or deleted from) the cluster with `kubectl`.
//!
//! The DNS addon is installed once the control plane is up. The dashboard
//! set follows the `enable_dashboard_addons` toggle in both directions.

pub mod cluster;
pub mod dashboard;
pub mod dns;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::ConvergeError;
use crate::infrastructure::{CommandRunner, Renderer};
use crate::types::Layout;

/// Render `addons/<template>` into the addons directory and apply it.
///
/// Render failures come back as `ConvergeError::Render`, apply failures as
/// `ConvergeError::Command`; callers treat the latter as transient.
pub fn create_addon(
    runner: &dyn CommandRunner,
    renderer: &dyn Renderer,
    layout: &Layout,
    template: &str,
    context: &Value,
) -> Result<(), ConvergeError> {
    let target = layout.addons_dir.join(template);
    renderer.render(&format!("addons/{}", template), &target, context)?;
    let target = target.display().to_string();
    runner.run("kubectl", &["apply", "-f", target.as_str()])?;
    info!(template, "addon applied");
    Ok(())
}

/// Delete the objects described by a previously rendered manifest. Failure
/// is logged only.
pub fn delete_addon(runner: &dyn CommandRunner, layout: &Layout, template: &str) {
    let target = layout.addons_dir.join(template).display().to_string();
    match runner.run("kubectl", &["delete", "-f", target.as_str()]) {
        Ok(_) => info!(template, "addon deleted"),
        Err(e) => warn!(template, error = %e, "addon delete failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{MockRunner, RecordingRenderer};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn create_renders_then_applies() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::rooted(dir.path());
        let runner = MockRunner::new();
        let renderer = RecordingRenderer::new();
        create_addon(&runner, &renderer, &layout, "kubedns-svc.yaml", &json!({"arch": "amd64"}))
            .unwrap();

        let rendered = renderer.last("addons/kubedns-svc.yaml").unwrap();
        assert_eq!(rendered.target, layout.addons_dir.join("kubedns-svc.yaml"));
        assert_eq!(
            runner.executed_commands(),
            vec![format!("kubectl apply -f {}", rendered.target.display())]
        );
    }

    #[test]
    fn apply_failure_is_command_failure() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::rooted(dir.path());
        let runner = MockRunner::new();
        runner.fail("kubectl apply", "connection refused");
        let err = create_addon(&runner, &RecordingRenderer::new(), &layout, "a.yaml", &json!({}))
            .unwrap_err();
        assert!(err.is_command_failure());
    }

    #[test]
    fn render_failure_skips_apply() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::rooted(dir.path());
        let runner = MockRunner::new();
        let renderer = RecordingRenderer::new();
        renderer.fail("addons/a.yaml");
        let err = create_addon(&runner, &renderer, &layout, "a.yaml", &json!({})).unwrap_err();
        assert!(matches!(err, ConvergeError::Render(_)));
        assert!(runner.executed_commands().is_empty());
    }

    #[test]
    fn delete_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let layout = Layout::rooted(dir.path());
        let runner = MockRunner::new();
        runner.fail("kubectl delete", "not found");
        delete_addon(&runner, &layout, "a.yaml");
        assert_eq!(runner.matching("kubectl delete").len(), 1);
    }
}
