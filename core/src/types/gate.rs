use std::fmt;
use std::str::FromStr;

/// A named boolean convergence condition.
///
/// Gates are the only signal one rule may observe about another. The string
/// names are persisted, so they must never change once released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gate {
    // Owned by rules in this crate.
    AuthenticationSetup,
    ComponentsStarted,
    KubeDnsAvailable,
    DashboardAvailable,
    CephStorageConfigured,
    AppVersionSet,
    CniConfigured,

    // Mirrors of relation availability, refreshed at the start of every pass.
    EtcdAvailable,
    CertificatesAvailable,
    CaAvailable,
    ServerCertAvailable,
    ClientCertAvailable,
    LoadBalancerAvailable,
    CephStorageAvailable,
    CniConnected,
    ClusterDnsConnected,
    KubeApiConnected,
    KubeApiEndpointAvailable,
}

impl Gate {
    pub const ALL: [Gate; 18] = [
        Gate::AuthenticationSetup,
        Gate::ComponentsStarted,
        Gate::KubeDnsAvailable,
        Gate::DashboardAvailable,
        Gate::CephStorageConfigured,
        Gate::AppVersionSet,
        Gate::CniConfigured,
        Gate::EtcdAvailable,
        Gate::CertificatesAvailable,
        Gate::CaAvailable,
        Gate::ServerCertAvailable,
        Gate::ClientCertAvailable,
        Gate::LoadBalancerAvailable,
        Gate::CephStorageAvailable,
        Gate::CniConnected,
        Gate::ClusterDnsConnected,
        Gate::KubeApiConnected,
        Gate::KubeApiEndpointAvailable,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Gate::AuthenticationSetup => "authentication.setup",
            Gate::ComponentsStarted => "kubernetes-master.components.started",
            Gate::KubeDnsAvailable => "kube-dns.available",
            Gate::DashboardAvailable => "kubernetes.dashboard.available",
            Gate::CephStorageConfigured => "ceph-storage.configured",
            Gate::AppVersionSet => "kubernetes-master.app_version.set",
            Gate::CniConfigured => "cni.configured",
            Gate::EtcdAvailable => "etcd.available",
            Gate::CertificatesAvailable => "certificates.available",
            Gate::CaAvailable => "certificates.ca.available",
            Gate::ServerCertAvailable => "certificates.server.cert.available",
            Gate::ClientCertAvailable => "certificates.client.cert.available",
            Gate::LoadBalancerAvailable => "loadbalancer.available",
            Gate::CephStorageAvailable => "ceph-storage.available",
            Gate::CniConnected => "cni.connected",
            Gate::ClusterDnsConnected => "cluster-dns.connected",
            Gate::KubeApiConnected => "kube-api.connected",
            Gate::KubeApiEndpointAvailable => "kube-api-endpoint.available",
        }
    }

    /// Whether the gate mirrors relation data rather than a completed step.
    pub fn is_relation_mirror(self) -> bool {
        !matches!(
            self,
            Gate::AuthenticationSetup
                | Gate::ComponentsStarted
                | Gate::KubeDnsAvailable
                | Gate::DashboardAvailable
                | Gate::CephStorageConfigured
                | Gate::AppVersionSet
                | Gate::CniConfigured
        )
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gate::ALL
            .iter()
            .copied()
            .find(|g| g.name() == s)
            .ok_or_else(|| format!("unknown gate: {}", s))
    }
}
