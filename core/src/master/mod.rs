//! The Kubernetes master rule table.
//!
//! Rules are listed in evaluation order. Order only decides what can happen
//! within a single pass; across passes the gates alone decide what fires.

pub mod auth;
pub mod ceph;
pub mod control_plane;
pub mod kubeconfig;
pub mod network;
pub mod relations;
pub mod status;

use tracing::info;

use crate::addons::{dashboard, dns};
use crate::convergence::{Rule, RulesEngine};
use crate::error::StateError;
use crate::infrastructure::host::{self, CONTROL_PLANE_SERVICES};
use crate::infrastructure::CommandRunner;
use crate::state::ClusterState;
use crate::types::Gate;

pub const API_SERVER: &str = "kube-apiserver";
pub const CONTROLLER_MANAGER: &str = "kube-controller-manager";
pub const SCHEDULER: &str = "kube-scheduler";

/// Gates dropped on upgrade so the control plane and addons are redeployed.
pub const UPGRADE_RESET_GATES: [Gate; 4] = [
    Gate::ComponentsStarted,
    Gate::KubeDnsAvailable,
    Gate::DashboardAvailable,
    Gate::AppVersionSet,
];

pub fn rules() -> Vec<Rule> {
    vec![
        relations::CONFIGURE_CNI,
        auth::SETUP_AUTHENTICATION,
        status::SET_APP_VERSION,
        control_plane::START_MASTER,
        relations::SEND_CLUSTER_DNS_DETAIL,
        relations::PUSH_SERVICE_DATA,
        relations::SEND_CERT_REQUEST,
        relations::PUSH_API_DATA,
        dns::START_KUBE_DNS,
        dashboard::INSTALL_DASHBOARD_ADDONS,
        dashboard::REMOVE_DASHBOARD_ADDONS,
        kubeconfig::LOADBALANCER_KUBECONFIG,
        kubeconfig::CREATE_SELF_CONFIG,
        ceph::CEPH_STATE_CONTROL,
        ceph::CEPH_STORAGE,
        status::IDLE_STATUS,
    ]
}

pub fn engine() -> RulesEngine {
    RulesEngine::new(rules())
}

/// Stop the control plane and drop the gates that redeploy it.
pub fn reset_for_upgrade(
    state: &mut ClusterState,
    runner: &dyn CommandRunner,
) -> Result<(), StateError> {
    for service in CONTROL_PLANE_SERVICES {
        host::service_stop(runner, service);
    }
    for gate in UPGRADE_RESET_GATES {
        if state.clear_gate(gate)? {
            info!(gate = %gate, "gate cleared for upgrade");
        }
    }
    Ok(())
}
