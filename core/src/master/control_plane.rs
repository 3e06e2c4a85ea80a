//! Control-plane start: etcd wiring, unit and defaults files, service
//! restarts.
//!
//! The start rule fires once per `components.started` cycle. Upgrade clears
//! that gate, so everything here must tolerate running again against flag
//! sets that already hold values from an earlier start.

use std::path::Path;

use serde_json::json;
use tracing::info;

use crate::convergence::{Context, Outcome, Rule};
use crate::error::ConvergeError;
use crate::infrastructure::host::{self, CONTROL_PLANE_SERVICES};
use crate::state::ClusterState;
use crate::types::{CertificatesRelation, EtcdRelation, Gate, RelationKind, StatusLevel};

use super::{API_SERVER, CONTROLLER_MANAGER, SCHEDULER};

const ADMISSION_CONTROL: &str = "NamespaceLifecycle,LimitRanger,ServiceAccount,ResourceQuota";
const INSECURE_MASTER: &str = "http://127.0.0.1:8080";

pub const START_MASTER: Rule = Rule {
    name: "start_master",
    when: &[Gate::EtcdAvailable, Gate::ServerCertAvailable],
    when_not: &[Gate::ComponentsStarted],
    inputs: &[RelationKind::Etcd, RelationKind::Certificates],
    body: start_master,
};

fn start_master(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let relations = ctx.relations;
    let (Some(etcd), Some(certs)) = (&relations.etcd, &relations.certificates) else {
        return Ok(Outcome::Unchanged);
    };

    ctx.set_status(
        StatusLevel::Maintenance,
        "Rendering the Kubernetes master systemd files.",
    )?;
    let cidr = ctx.state.freeze_service_cidr(ctx.settings)?;
    info!(cidr = %cidr, "service CIDR frozen");
    ctx.state
        .flags(API_SERVER)?
        .add_strict("--service-cluster-ip-range", &cidr)?;

    handle_etcd_relation(ctx, etcd)?;
    render_files(ctx, certs)?;

    ctx.set_status(StatusLevel::Maintenance, "Starting the Kubernetes master services.")?;
    for service in CONTROL_PLANE_SERVICES {
        host::service_restart(ctx.runner, service)?;
    }
    host::open_port(ctx.runner, ctx.settings.api_port)?;
    ctx.set_gate(Gate::ComponentsStarted)?;
    Ok(Outcome::Converged)
}

// ---------------------------------------------------------------------------
// etcd
// ---------------------------------------------------------------------------

fn save_credential(dir: &Path, name: &str, pem: &str) -> Result<String, ConvergeError> {
    let path = dir.join(name);
    std::fs::write(&path, pem).map_err(|e| ConvergeError::io(&path, e))?;
    Ok(path.display().to_string())
}

/// Store the etcd client credentials and point the apiserver at etcd.
///
/// Stale etcd flags from an earlier start are torn down before the fresh
/// values go in, so the apiserver never sees two server lists.
pub fn handle_etcd_relation(ctx: &mut Context<'_>, etcd: &EtcdRelation) -> Result<(), ConvergeError> {
    let etcd_dir = &ctx.settings.layout.etcd_dir;
    std::fs::create_dir_all(etcd_dir).map_err(|e| ConvergeError::io(etcd_dir, e))?;
    let ca = save_credential(etcd_dir, "client-ca.pem", &etcd.client_ca)?;
    let key = save_credential(etcd_dir, "client-key.pem", &etcd.client_key)?;
    let cert = save_credential(etcd_dir, "client-cert.pem", &etcd.client_cert)?;

    apply_etcd_flags(ctx.state, &ca, &key, &cert, &etcd.connection_string)?;
    Ok(())
}

pub fn apply_etcd_flags(
    state: &mut ClusterState,
    ca: &str,
    key: &str,
    cert: &str,
    servers: &str,
) -> Result<(), ConvergeError> {
    let mut api = state.flags(API_SERVER)?;
    if api.contains("--etcd-servers") {
        api.remove("--etcd-cafile")?;
        api.remove("--etcd-keyfile")?;
        api.remove("--etcd-certfile")?;
        api.remove_strict("--etcd-servers")?;
        api.remove("--etcd-servers")?;
    }
    api.add("--etcd-cafile", ca)?;
    api.add("--etcd-keyfile", key)?;
    api.add("--etcd-certfile", cert)?;
    api.add_strict("--etcd-servers", servers)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit files
// ---------------------------------------------------------------------------

fn path_str(path: &Option<String>) -> &str {
    path.as_deref().unwrap_or_default()
}

fn add_static_flags(
    state: &mut ClusterState,
    certs: &CertificatesRelation,
) -> Result<(), ConvergeError> {
    let ca = path_str(&certs.ca_path);

    let mut api = state.flags(API_SERVER)?;
    api.add_strict("--min-request-timeout", "300")?;
    api.add_strict("--v", "4")?;
    api.add_strict("--client-ca-file", ca)?;
    api.add_strict("--tls-cert-file", path_str(&certs.server_cert_path))?;
    api.add_strict("--tls-private-key-file", path_str(&certs.server_key_path))?;
    api.add_strict("--logtostderr", "true")?;
    api.add_strict("--allow-privileged", "false")?;
    api.add_strict("--insecure-bind-address", "127.0.0.1")?;
    api.add_strict("--insecure-port", "8080")?;
    api.add_strict("--admission-control", ADMISSION_CONTROL)?;

    let mut scheduler = state.flags(SCHEDULER)?;
    scheduler.add_strict("--v", "2")?;
    scheduler.add_strict("--logtostderr", "true")?;
    scheduler.add_strict("--master", INSECURE_MASTER)?;

    let mut cm = state.flags(CONTROLLER_MANAGER)?;
    cm.add_strict("--min-resync-period", "3m")?;
    cm.add_strict("--v", "2")?;
    cm.add_strict("--root-ca-file", ca)?;
    cm.add_strict("--logtostderr", "true")?;
    cm.add_strict("--master", INSECURE_MASTER)?;
    Ok(())
}

/// Render the systemd unit and defaults file for every control-plane
/// service plus the shared `kube-defaults`, then reload systemd.
pub fn render_files(ctx: &mut Context<'_>, certs: &CertificatesRelation) -> Result<(), ConvergeError> {
    add_static_flags(ctx.state, certs)?;

    let settings = ctx.settings;
    let unit = &ctx.relations.unit;
    let context = json!({
        "service_cidr": ctx.service_cidr(),
        "dns_domain": settings.dns_domain,
        "enable_dashboard_addons": settings.enable_dashboard_addons,
        "api_port": settings.api_port,
        "arch": host::arch(ctx.runner)?,
        "master_address": unit.private_address,
        "public_address": unit.public_address,
        "private_address": unit.private_address,
        "kube_apiserver_flags": ctx.state.flag_set(API_SERVER)?.serialize(),
        "kube_controller_manager_flags": ctx.state.flag_set(CONTROLLER_MANAGER)?.serialize(),
        "kube_scheduler_flags": ctx.state.flag_set(SCHEDULER)?.serialize(),
    });

    let layout = &settings.layout;
    for service in CONTROL_PLANE_SERVICES {
        ctx.renderer.render(
            &format!("{}.service", service),
            &layout.unit_dir.join(format!("{}.service", service)),
            &context,
        )?;
        ctx.renderer.render(
            &format!("{}.defaults", service),
            &layout.defaults_dir.join(service),
            &context,
        )?;
    }
    ctx.renderer.render(
        "kube-defaults.defaults",
        &layout.defaults_dir.join("kube-defaults"),
        &context,
    )?;

    host::daemon_reload(ctx.runner);
    Ok(())
}
