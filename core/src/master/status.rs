//! Unit status and application version reporting.

use tracing::{info, warn};

use crate::addons::cluster;
use crate::convergence::{Context, Outcome, Rule};
use crate::error::ConvergeError;
use crate::infrastructure::host;
use crate::types::{Gate, StatusLevel};

pub const SET_APP_VERSION: Rule = Rule {
    name: "set_app_version",
    when: &[],
    when_not: &[Gate::AppVersionSet],
    inputs: &[],
    body: set_app_version,
};

pub const IDLE_STATUS: Rule = Rule {
    name: "idle_status",
    when: &[Gate::KubeDnsAvailable],
    when_not: &[],
    inputs: &[],
    body: idle_status,
};

/// Version number from `kube-apiserver --version` output such as
/// `Kubernetes v1.5.3`.
pub fn parse_version(output: &str) -> &str {
    output.rsplit(" v").next().unwrap_or(output).trim()
}

fn set_app_version(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let output = match ctx.runner.run("kube-apiserver", &["--version"]) {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "cannot query apiserver version");
            return Ok(Outcome::Waiting("kube-apiserver version unavailable".into()));
        }
    };
    let version = parse_version(&output);
    host::application_version_set(ctx.runner, version)?;
    ctx.state.record_app_version(version)?;
    info!(version, "application version set");
    ctx.set_gate(Gate::AppVersionSet)?;
    Ok(Outcome::Converged)
}

fn idle_status(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let effective = ctx.service_cidr();
    if !cluster::all_kube_system_pods_running(ctx.runner) {
        ctx.set_status(StatusLevel::Waiting, "Waiting for kube-system pods to start")?;
    } else if ctx.settings.service_cidr != effective {
        let message = format!("WARN: cannot change service-cidr, still using {}", effective);
        ctx.set_status(StatusLevel::Active, &message)?;
    } else {
        ctx.set_status(StatusLevel::Active, "Kubernetes master running.")?;
    }
    Ok(Outcome::Converged)
}
