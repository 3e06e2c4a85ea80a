//! Admin kubeconfig for the master unit.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::convergence::{Context, Outcome, Rule};
use crate::error::ConvergeError;
use crate::types::{Gate, RelationKind};

const FINGERPRINT: &str = "kubeconfig.server";
const CLUSTER: &str = "juju-cluster";
const CONTEXT: &str = "juju-context";

pub const LOADBALANCER_KUBECONFIG: Rule = Rule {
    name: "loadbalancer_kubeconfig",
    when: &[
        Gate::LoadBalancerAvailable,
        Gate::CaAvailable,
        Gate::ClientCertAvailable,
    ],
    when_not: &[],
    inputs: &[RelationKind::LoadBalancer, RelationKind::Certificates],
    body: loadbalancer_kubeconfig,
};

pub const CREATE_SELF_CONFIG: Rule = Rule {
    name: "create_self_config",
    when: &[Gate::CaAvailable, Gate::ClientCertAvailable],
    when_not: &[Gate::LoadBalancerAvailable],
    inputs: &[RelationKind::Certificates],
    body: create_self_config,
};

fn loadbalancer_kubeconfig(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let relations = ctx.relations;
    let endpoint = relations
        .loadbalancer
        .as_ref()
        .and_then(|lb| lb.endpoints.first());
    match endpoint {
        Some(ep) => {
            let server = format!("https://{}:{}", ep.public_address, ep.port);
            build_kubeconfig(ctx, &server)
        }
        None => Ok(Outcome::Unchanged),
    }
}

fn create_self_config(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let server = format!(
        "https://{}:{}",
        ctx.relations.unit.public_address, ctx.settings.api_port
    );
    build_kubeconfig(ctx, &server)
}

/// Paths that must exist on disk before a kubeconfig can embed them.
struct ClientMaterial {
    ca: String,
    key: String,
    cert: String,
}

fn existing(path: &Option<String>) -> Option<String> {
    path.as_ref().filter(|p| Path::new(p).is_file()).cloned()
}

fn client_material(ctx: &Context<'_>) -> Option<ClientMaterial> {
    let certs = ctx.relations.certificates.as_ref()?;
    Some(ClientMaterial {
        ca: existing(&certs.ca_path)?,
        key: existing(&certs.client_key_path)?,
        cert: existing(&certs.client_cert_path)?,
    })
}

/// Regenerate the kubeconfig when the server address changed.
pub fn build_kubeconfig(ctx: &mut Context<'_>, server: &str) -> Result<Outcome, ConvergeError> {
    let Some(material) = client_material(ctx) else {
        return Ok(Outcome::Unchanged);
    };
    if !ctx.state.fingerprints().observe(FINGERPRINT, server)? {
        return Ok(Outcome::Unchanged);
    }

    let result = write_kubeconfig(ctx, server, &material);
    if let Err(e) = &result {
        warn!(server, error = %e, "kubeconfig generation failed");
        // Next trigger must try again even though the server is unchanged.
        ctx.state.fingerprints().forget(FINGERPRINT)?;
    }
    result.map(|()| Outcome::Converged)
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    target.with_file_name(name)
}

fn write_kubeconfig(
    ctx: &Context<'_>,
    server: &str,
    material: &ClientMaterial,
) -> Result<(), ConvergeError> {
    let layout = &ctx.settings.layout;
    let target = layout.kubeconfig();
    let staging = staging_path(&target);
    std::fs::create_dir_all(&layout.kubeconfig_dir)
        .map_err(|e| ConvergeError::io(&layout.kubeconfig_dir, e))?;

    // Start from the current config so unrelated entries survive.
    if target.is_file() {
        std::fs::copy(&target, &staging).map_err(|e| ConvergeError::io(&staging, e))?;
    } else {
        std::fs::write(&staging, "").map_err(|e| ConvergeError::io(&staging, e))?;
    }

    let result = run_config_commands(ctx, &staging, server, material).and_then(|()| {
        std::fs::rename(&staging, &target).map_err(|e| ConvergeError::io(&target, e))
    });
    if result.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    result?;

    let owner = &layout.kubeconfig_owner;
    let spec = format!("{}:{}", owner, owner);
    let target_str = target.display().to_string();
    ctx.runner.run("chown", &[spec.as_str(), target_str.as_str()])?;
    info!(server, path = %target.display(), "kubeconfig written");
    Ok(())
}

fn run_config_commands(
    ctx: &Context<'_>,
    kubeconfig: &Path,
    server: &str,
    material: &ClientMaterial,
) -> Result<(), ConvergeError> {
    let kubeconfig = format!("--kubeconfig={}", kubeconfig.display());
    let user = ctx.settings.layout.kubeconfig_owner.as_str();
    let kubectl = |args: &[&str]| -> Result<(), ConvergeError> {
        let mut argv = vec!["config", kubeconfig.as_str()];
        argv.extend_from_slice(args);
        ctx.runner.run("kubectl", &argv)?;
        Ok(())
    };

    let server_arg = format!("--server={}", server);
    let ca_arg = format!("--certificate-authority={}", material.ca);
    let key_arg = format!("--client-key={}", material.key);
    let cert_arg = format!("--client-certificate={}", material.cert);
    let cluster_arg = format!("--cluster={}", CLUSTER);
    let user_arg = format!("--user={}", user);

    kubectl(&["set-cluster", CLUSTER, server_arg.as_str(), ca_arg.as_str(), "--embed-certs=true"])?;
    kubectl(&["set-credentials", user, key_arg.as_str(), cert_arg.as_str(), "--embed-certs=true"])?;
    kubectl(&["set-context", CONTEXT, cluster_arg.as_str(), user_arg.as_str()])?;
    kubectl(&["use-context", CONTEXT])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use crate::types::{Endpoint, LoadBalancerRelation};

    #[test]
    fn self_config_runs_four_commands_and_chowns() {
        let mut h = Harness::new();
        h.with_certificates();
        assert_eq!(h.fire(create_self_config).unwrap(), Outcome::Converged);

        let config = h.runner.matching("kubectl config");
        assert_eq!(config.len(), 4);
        assert!(config[0].contains("set-cluster juju-cluster --server=https://54.1.2.3:6443"));
        assert!(config[1].contains("set-credentials ubuntu"));
        assert!(config[3].ends_with("use-context juju-context"));

        let target = h.settings.layout.kubeconfig();
        assert!(target.is_file());
        assert!(!staging_path(&target).exists());
        assert_eq!(
            h.runner.matching("chown"),
            vec![format!("chown ubuntu:ubuntu {}", target.display())]
        );
    }

    #[test]
    fn unchanged_server_is_skipped() {
        let mut h = Harness::new();
        h.with_certificates();
        h.fire(create_self_config).unwrap();
        h.runner.clear_commands();
        assert_eq!(h.fire(create_self_config).unwrap(), Outcome::Unchanged);
        assert!(h.runner.executed_commands().is_empty());
    }

    #[test]
    fn loadbalancer_address_wins() {
        let mut h = Harness::new();
        h.with_certificates();
        h.relations.loadbalancer = Some(LoadBalancerRelation {
            endpoints: vec![Endpoint {
                public_address: "10.0.0.99".into(),
                port: 443,
            }],
        });
        h.fire(loadbalancer_kubeconfig).unwrap();
        assert!(h.runner.matching("kubectl config")[0].contains("--server=https://10.0.0.99:443"));
    }

    #[test]
    fn missing_cert_file_is_noop() {
        let mut h = Harness::new();
        h.with_certificates();
        std::fs::remove_file(h.path("tls/client.key")).unwrap();
        assert_eq!(h.fire(create_self_config).unwrap(), Outcome::Unchanged);
        assert!(h.runner.executed_commands().is_empty());
    }

    #[test]
    fn failure_rearms_fingerprint() {
        let mut h = Harness::new();
        h.with_certificates();
        h.runner.fail("kubectl config", "connection refused");
        assert!(h.fire(create_self_config).is_err());
        assert!(!h.settings.layout.kubeconfig().exists());

        h.runner.reset_responses();
        assert_eq!(h.fire(create_self_config).unwrap(), Outcome::Converged);
    }
}
