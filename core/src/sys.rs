use std::path::{Path, PathBuf};

use tracing::info;

use crate::convergence::{Context, PassReport, RulesEngine};
use crate::error::{ConvergeError, StateError};
use crate::infrastructure::{CommandRunner, Renderer};
use crate::master;
use crate::state::{lock, ClusterState, PassLock};
use crate::types::{RelationSnapshot, Settings};

/// Hook name the runtime uses after replacing the charm payload.
pub const UPGRADE_HOOK: &str = "upgrade-charm";

const LOCK_FILE: &str = "kubemaster.lock";
const LOCK_TIMEOUT_MS: u64 = 600_000;

/// Central runtime for one master unit. Owns the state and dispatches every
/// trigger through the rule table.
///
/// Generic over the command runner and renderer so the same dispatch path
/// runs against real tools or test doubles.
pub struct Sys<R: CommandRunner, T: Renderer> {
    state_dir: Option<PathBuf>,
    state: ClusterState,
    settings: Settings,
    runner: R,
    renderer: T,
    engine: RulesEngine,
}

impl<R: CommandRunner, T: Renderer> Sys<R, T> {
    /// Create a Sys whose state lives in `state_dir`.
    pub fn new(state_dir: &Path, settings: Settings, runner: R, renderer: T) -> Result<Self, StateError> {
        Ok(Sys {
            state_dir: Some(state_dir.to_path_buf()),
            state: ClusterState::open(state_dir)?,
            settings,
            runner,
            renderer,
            engine: master::engine(),
        })
    }

    /// Create a Sys with unpersisted state. Useful for testing.
    pub fn in_memory(settings: Settings, runner: R, renderer: T) -> Self {
        Sys {
            state_dir: None,
            state: ClusterState::in_memory(),
            settings,
            runner,
            renderer,
            engine: master::engine(),
        }
    }

    /// Serialize with other processes working on the same state directory,
    /// then pick up whatever they wrote.
    fn begin(&mut self) -> Result<Option<PassLock>, StateError> {
        let guard = match &self.state_dir {
            Some(dir) => Some(lock::acquire(&dir.join(LOCK_FILE), LOCK_TIMEOUT_MS)?),
            None => None,
        };
        self.state.reload()?;
        Ok(guard)
    }

    /// Run one convergence pass for `hook`.
    pub fn dispatch(
        &mut self,
        hook: &str,
        relations: &RelationSnapshot,
    ) -> Result<PassReport, ConvergeError> {
        let _guard = self.begin()?;
        info!(hook, "dispatching");
        if hook == UPGRADE_HOOK {
            master::reset_for_upgrade(&mut self.state, &self.runner)?;
        }
        let mut ctx = Context::new(
            &mut self.state,
            &self.settings,
            relations,
            &self.runner,
            &self.renderer,
        );
        let report = self.engine.evaluate(&mut ctx)?;
        info!(
            hook,
            fired = report.fired.len(),
            published = report.publications.len(),
            "pass complete"
        );
        Ok(report)
    }

    /// Upgrade reset without a convergence pass.
    pub fn upgrade(&mut self) -> Result<(), StateError> {
        let _guard = self.begin()?;
        master::reset_for_upgrade(&mut self.state, &self.runner)
    }

    pub fn state(&self) -> &ClusterState {
        &self.state
    }

    /// Re-read persisted state without running anything.
    pub fn refresh(&mut self) -> Result<&ClusterState, StateError> {
        let _guard = self.begin()?;
        Ok(&self.state)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn renderer(&self) -> &T {
        &self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{MockRunner, RecordingRenderer};
    use crate::types::{CertificatesRelation, EtcdRelation, Gate, Layout};
    use tempfile::TempDir;

    fn snapshot(root: &Path) -> RelationSnapshot {
        let tls = root.join("tls");
        std::fs::create_dir_all(&tls).unwrap();
        let path = |name: &str| {
            let p = tls.join(name);
            std::fs::write(&p, name).unwrap();
            Some(p.display().to_string())
        };
        RelationSnapshot {
            etcd: Some(EtcdRelation {
                connection_string: "https://10.0.0.1:2379".into(),
                client_ca: "ca".into(),
                client_key: "key".into(),
                client_cert: "cert".into(),
            }),
            certificates: Some(CertificatesRelation {
                ca_path: path("ca.crt"),
                server_cert_path: path("server.crt"),
                server_key_path: path("server.key"),
                client_cert_path: path("client.crt"),
                client_key_path: path("client.key"),
            }),
            ..RelationSnapshot::default()
        }
    }

    fn sys(dir: &TempDir) -> Sys<MockRunner, RecordingRenderer> {
        let settings = Settings {
            layout: Layout::rooted(dir.path()),
            ..Settings::default()
        };
        Sys::new(&dir.path().join("state"), settings, MockRunner::new(), RecordingRenderer::new())
            .unwrap()
    }

    #[test]
    fn state_survives_across_processes() {
        let dir = TempDir::new().unwrap();
        let rel = snapshot(dir.path());
        {
            let mut first = sys(&dir);
            first.dispatch("config-changed", &rel).unwrap();
            assert!(first.state().is_set(Gate::ComponentsStarted));
        }
        let mut second = sys(&dir);
        second.dispatch("update-status", &rel).unwrap();
        assert!(second.runner().matching("systemctl restart").is_empty());
        assert!(second.state().is_set(Gate::ComponentsStarted));
        assert_eq!(
            second.state().frozen_service_cidr().as_deref(),
            Some("10.152.183.0/24")
        );
    }

    #[test]
    fn dispatch_picks_up_writes_from_another_instance() {
        let dir = TempDir::new().unwrap();
        let rel = snapshot(dir.path());
        let mut a = sys(&dir);
        let mut b = sys(&dir);
        a.dispatch("config-changed", &rel).unwrap();
        b.dispatch("update-status", &rel).unwrap();
        assert!(b.runner().matching("systemctl restart").is_empty());
    }

    #[test]
    fn upgrade_hook_resets_then_converges() {
        let dir = TempDir::new().unwrap();
        let rel = snapshot(dir.path());
        let mut s = sys(&dir);
        s.dispatch("install", &rel).unwrap();
        s.runner().clear_commands();
        s.dispatch(UPGRADE_HOOK, &rel).unwrap();
        assert_eq!(s.runner().matching("systemctl stop").len(), 3);
        assert_eq!(s.runner().matching("systemctl restart").len(), 3);
        assert!(s.state().is_set(Gate::ComponentsStarted));
    }

    #[test]
    fn upgrade_command_only_resets() {
        let dir = TempDir::new().unwrap();
        let rel = snapshot(dir.path());
        let mut s = sys(&dir);
        s.dispatch("install", &rel).unwrap();
        s.upgrade().unwrap();
        assert!(!s.state().is_set(Gate::ComponentsStarted));
        assert!(s.state().is_set(Gate::AuthenticationSetup));
    }

    #[test]
    fn in_memory_sys_runs_without_state_dir() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            layout: Layout::rooted(dir.path()),
            ..Settings::default()
        };
        let mut s = Sys::in_memory(settings, MockRunner::new(), RecordingRenderer::new());
        let report = s.dispatch("install", &RelationSnapshot::default()).unwrap();
        assert!(report.fired_names().contains(&"setup_authentication"));
    }
}
