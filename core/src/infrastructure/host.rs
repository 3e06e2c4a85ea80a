//! Host-level operations expressed as external commands: service control,
//! package installs, architecture query and the runtime's hook tools.

use tracing::{info, warn};

use super::runner::CommandRunner;
use crate::error::CommandError;
use crate::types::Status;

/// The control-plane services, in start order.
pub const CONTROL_PLANE_SERVICES: [&str; 3] =
    ["kube-apiserver", "kube-controller-manager", "kube-scheduler"];

/// Package architecture of this machine, e.g. `amd64`.
pub fn arch(runner: &dyn CommandRunner) -> Result<String, CommandError> {
    Ok(runner
        .run("dpkg", &["--print-architecture"])?
        .trim()
        .to_string())
}

pub fn service_restart(runner: &dyn CommandRunner, service: &str) -> Result<(), CommandError> {
    info!(service, "restarting service");
    runner.run("systemctl", &["restart", service]).map(|_| ())
}

/// Stop a service. Failure is logged and reported as `false`.
pub fn service_stop(runner: &dyn CommandRunner, service: &str) -> bool {
    info!(service, "stopping service");
    match runner.run("systemctl", &["stop", service]) {
        Ok(_) => true,
        Err(e) => {
            warn!(service, error = %e, "failed to stop service");
            false
        }
    }
}

/// Ask systemd to re-read unit files. Failure is logged, never fatal.
pub fn daemon_reload(runner: &dyn CommandRunner) {
    if let Err(e) = runner.run("systemctl", &["daemon-reload"]) {
        warn!(error = %e, "systemctl daemon-reload failed");
    }
}

pub fn apt_install(runner: &dyn CommandRunner, packages: &[&str]) -> Result<(), CommandError> {
    let mut args = vec!["install", "-y"];
    args.extend_from_slice(packages);
    runner.run("apt-get", &args).map(|_| ())
}

pub fn open_port(runner: &dyn CommandRunner, port: u16) -> Result<(), CommandError> {
    let spec = format!("{}/tcp", port);
    runner.run("open-port", &[spec.as_str()]).map(|_| ())
}

/// Publish the unit status to the runtime. Failure is logged only; the
/// status is also kept in local state.
pub fn status_set(runner: &dyn CommandRunner, status: &Status) {
    if let Err(e) = runner.run("status-set", &[status.level.as_str(), status.message.as_str()]) {
        warn!(status = %status, error = %e, "status-set failed");
    }
}

pub fn application_version_set(
    runner: &dyn CommandRunner,
    version: &str,
) -> Result<(), CommandError> {
    runner.run("application-version-set", &[version]).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runner::MockRunner;
    use crate::types::StatusLevel;

    #[test]
    fn arch_trims_output() {
        let runner = MockRunner::new();
        runner.respond("dpkg --print-architecture", "amd64\n");
        assert_eq!(arch(&runner).unwrap(), "amd64");
    }

    #[test]
    fn stop_failure_is_reported_not_raised() {
        let runner = MockRunner::new();
        runner.fail("systemctl stop", "unit not loaded");
        assert!(!service_stop(&runner, "kube-scheduler"));
    }

    #[test]
    fn status_set_passes_level_and_message() {
        let runner = MockRunner::new();
        status_set(&runner, &Status::new(StatusLevel::Waiting, "Waiting for kube-system pods to start"));
        assert_eq!(
            runner.executed_commands(),
            vec!["status-set waiting Waiting for kube-system pods to start"]
        );
    }

    #[test]
    fn open_port_uses_tcp() {
        let runner = MockRunner::new();
        open_port(&runner, 6443).unwrap();
        assert_eq!(runner.executed_commands(), vec!["open-port 6443/tcp"]);
    }

    #[test]
    fn apt_install_lists_packages() {
        let runner = MockRunner::new();
        apt_install(&runner, &["ceph-common"]).unwrap();
        assert_eq!(runner.executed_commands(), vec!["apt-get install -y ceph-common"]);
    }
}
