//! Ceph storage client setup.
//!
//! `ceph_state_control` watches the relation data and re-arms
//! `ceph_storage` whenever it changes. `ceph_storage` installs the client,
//! writes `ceph.conf` and the admin keyring, and publishes the admin key to
//! the cluster as a secret.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use tracing::{info, warn};

use crate::convergence::{Context, Outcome, Rule};
use crate::error::ConvergeError;
use crate::infrastructure::host;
use crate::types::{CephRelation, Gate, RelationKind};

const FINGERPRINT: &str = "ceph-config";
const KEYRING: &str = "ceph.client.admin.keyring";
const SECRET_TEMPLATE: &str = "ceph-secret.yaml";

pub const CEPH_STATE_CONTROL: Rule = Rule {
    name: "ceph_state_control",
    when: &[Gate::CephStorageAvailable],
    when_not: &[],
    inputs: &[RelationKind::Ceph],
    body: ceph_state_control,
};

pub const CEPH_STORAGE: Rule = Rule {
    name: "ceph_storage",
    when: &[Gate::CephStorageAvailable],
    when_not: &[Gate::CephStorageConfigured],
    inputs: &[RelationKind::Ceph],
    body: ceph_storage,
};

fn ceph_state_control(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let relations = ctx.relations;
    let Some(ceph) = &relations.ceph else {
        return Ok(Outcome::Unchanged);
    };
    let payload = json!({
        "mon_hosts": ceph.mon_hosts,
        "fsid": ceph.fsid,
        "auth_supported": ceph.auth,
        "hostname": relations.unit.hostname,
        "key": ceph.key,
    });
    if ctx.state.fingerprints().observe(FINGERPRINT, &payload)? {
        info!("ceph relation data changed");
        ctx.clear_gate(Gate::CephStorageConfigured)?;
        Ok(Outcome::Converged)
    } else {
        Ok(Outcome::Unchanged)
    }
}

fn keyring_contents(ceph: &CephRelation) -> String {
    format!(
        "[client.admin]\n\tkey = {}\n",
        ceph.key.as_deref().unwrap_or_default()
    )
}

fn ceph_storage(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let relations = ctx.relations;
    let Some(ceph) = &relations.ceph else {
        return Ok(Outcome::Unchanged);
    };
    let settings = ctx.settings;
    let layout = &settings.layout;

    host::apt_install(ctx.runner, &["ceph-common"])?;

    std::fs::create_dir_all(&layout.ceph_dir).map_err(|e| ConvergeError::io(&layout.ceph_dir, e))?;
    let conf_context = json!({
        "mon_hosts": ceph.mon_hosts,
        "fsid": ceph.fsid,
        "auth_supported": ceph.auth,
        "use_syslog": "true",
        "ceph_public_network": "",
        "ceph_cluster_network": "",
        "loglevel": 1,
        "hostname": relations.unit.hostname,
    });
    ctx.renderer
        .render("ceph.conf", &layout.ceph_dir.join("ceph.conf"), &conf_context)?;

    // The key rotates independently of the rest of the config.
    let keyring = layout.ceph_dir.join(KEYRING);
    if let Err(e) = std::fs::write(&keyring, keyring_contents(ceph)) {
        warn!(path = %keyring.display(), error = %e, "cannot write admin keyring");
    }

    let Some(key) = ceph.admin_key() else {
        return Ok(Outcome::Waiting("ceph admin key not yet available".into()));
    };

    let staging = layout.staging_dir.join(SECRET_TEMPLATE);
    let secret_context = json!({ "secret": STANDARD.encode(key.as_bytes()) });
    ctx.renderer.render(SECRET_TEMPLATE, &staging, &secret_context)?;

    let staging_str = staging.display().to_string();
    let applied = ctx.runner.run("kubectl", &["apply", "-f", staging_str.as_str()]);
    if let Err(e) = std::fs::remove_file(&staging) {
        warn!(path = %staging.display(), error = %e, "cannot remove staged secret");
    }
    if let Err(e) = applied {
        warn!(error = %e, "ceph secret not applied");
        return Ok(Outcome::Waiting("ceph secret not applied".into()));
    }

    ctx.set_gate(Gate::CephStorageConfigured)?;
    Ok(Outcome::Converged)
}
