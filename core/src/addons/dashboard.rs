//! Dashboard and monitoring addons, installed or removed according to the
//! `enable_dashboard_addons` setting.

use serde_json::json;
use tracing::info;

use super::{cluster, create_addon, delete_addon};
use crate::convergence::{Context, Outcome, Rule};
use crate::error::ConvergeError;
use crate::infrastructure::host;
use crate::types::Gate;

pub const DASHBOARD_TEMPLATES: [&str; 7] = [
    "dashboard-controller.yaml",
    "dashboard-service.yaml",
    "influxdb-grafana-controller.yaml",
    "influxdb-service.yaml",
    "grafana-service.yaml",
    "heapster-controller.yaml",
    "heapster-service.yaml",
];

pub const INSTALL_DASHBOARD_ADDONS: Rule = Rule {
    name: "install_dashboard_addons",
    when: &[Gate::ComponentsStarted, Gate::KubeDnsAvailable],
    when_not: &[Gate::DashboardAvailable],
    inputs: &[],
    body: install_dashboard_addons,
};

pub const REMOVE_DASHBOARD_ADDONS: Rule = Rule {
    name: "remove_dashboard_addons",
    when: &[Gate::ComponentsStarted, Gate::DashboardAvailable],
    when_not: &[],
    inputs: &[],
    body: remove_dashboard_addons,
};

const WAITING_ON_API: &str = "Kubernetes dashboard waiting on kubeapi";

fn install_dashboard_addons(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    if !ctx.settings.enable_dashboard_addons {
        return Ok(Outcome::Unchanged);
    }
    info!("launching kubernetes dashboard");
    let arch = host::arch(ctx.runner)?;
    let num_nodes = match cluster::node_count(ctx.runner) {
        Ok(n) => n,
        Err(e) => {
            info!(error = %e, "{}", WAITING_ON_API);
            return Ok(Outcome::Waiting(WAITING_ON_API.into()));
        }
    };
    let context = json!({
        "arch": arch,
        "pillar": { "num_nodes": num_nodes },
    });

    for template in DASHBOARD_TEMPLATES {
        match create_addon(ctx.runner, ctx.renderer, &ctx.settings.layout, template, &context) {
            Ok(()) => {}
            Err(e) if e.is_command_failure() => {
                info!(template, error = %e, "{}", WAITING_ON_API);
                return Ok(Outcome::Waiting(WAITING_ON_API.into()));
            }
            Err(e) => return Err(e),
        }
    }
    ctx.set_gate(Gate::DashboardAvailable)?;
    Ok(Outcome::Converged)
}

fn remove_dashboard_addons(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    if ctx.settings.enable_dashboard_addons {
        return Ok(Outcome::Unchanged);
    }
    info!("removing kubernetes dashboard");
    for template in DASHBOARD_TEMPLATES {
        delete_addon(ctx.runner, &ctx.settings.layout, template);
    }
    ctx.clear_gate(Gate::DashboardAvailable)?;
    Ok(Outcome::Converged)
}
