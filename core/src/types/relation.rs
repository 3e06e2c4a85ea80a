//! Relation snapshots: the data each external dependency delivered for the
//! current invocation, plus the data this unit publishes back.
//!
//! Snapshots are constructed by the boundary layer and passed by reference
//! into rule bodies. Nothing here is cached between invocations.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::gate::Gate;

/// Facts about the local unit supplied by the runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UnitInfo {
    /// Unit name such as `kubernetes-master/0`.
    pub name: String,
    pub public_address: String,
    pub private_address: String,
    pub hostname: String,
}

/// etcd connection info and client TLS material (PEM contents).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EtcdRelation {
    pub connection_string: String,
    pub client_ca: String,
    pub client_key: String,
    pub client_cert: String,
}

/// Paths to certificate material issued by the certificate authority.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CertificatesRelation {
    pub ca_path: Option<String>,
    pub server_cert_path: Option<String>,
    pub server_key_path: Option<String>,
    pub client_cert_path: Option<String>,
    pub client_key_path: Option<String>,
}

impl CertificatesRelation {
    pub fn server_cert_available(&self) -> bool {
        self.server_cert_path.is_some() && self.server_key_path.is_some()
    }

    pub fn client_cert_available(&self) -> bool {
        self.client_cert_path.is_some() && self.client_key_path.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CephRelation {
    pub mon_hosts: Vec<String>,
    pub fsid: String,
    pub auth: String,
    pub key: Option<String>,
}

impl CephRelation {
    /// The admin key, if one was provided and is not blank.
    pub fn admin_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
    pub public_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadBalancerRelation {
    pub endpoints: Vec<Endpoint>,
}

/// Everything delivered to the unit for one trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelationSnapshot {
    pub unit: UnitInfo,
    pub etcd: Option<EtcdRelation>,
    pub certificates: Option<CertificatesRelation>,
    pub ceph: Option<CephRelation>,
    pub loadbalancer: Option<LoadBalancerRelation>,
    pub cni_connected: bool,
    pub cluster_dns_connected: bool,
    pub kube_api_connected: bool,
    pub kube_api_endpoint_connected: bool,
}

/// The relation channels a rule can declare as inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Etcd,
    Certificates,
    Ceph,
    LoadBalancer,
    Cni,
    ClusterDns,
    KubeApi,
    KubeApiEndpoint,
}

impl RelationSnapshot {
    pub fn has(&self, kind: RelationKind) -> bool {
        match kind {
            RelationKind::Etcd => self.etcd.is_some(),
            RelationKind::Certificates => self.certificates.is_some(),
            RelationKind::Ceph => self.ceph.is_some(),
            RelationKind::LoadBalancer => self
                .loadbalancer
                .as_ref()
                .is_some_and(|lb| !lb.endpoints.is_empty()),
            RelationKind::Cni => self.cni_connected,
            RelationKind::ClusterDns => self.cluster_dns_connected,
            RelationKind::KubeApi => self.kube_api_connected,
            RelationKind::KubeApiEndpoint => self.kube_api_endpoint_connected,
        }
    }

    /// The value each relation-mirror gate should hold for this snapshot.
    pub fn availability(&self) -> Vec<(Gate, bool)> {
        let certs = self.certificates.as_ref();
        vec![
            (Gate::EtcdAvailable, self.has(RelationKind::Etcd)),
            (Gate::CertificatesAvailable, certs.is_some()),
            (
                Gate::CaAvailable,
                certs.is_some_and(|c| c.ca_path.is_some()),
            ),
            (
                Gate::ServerCertAvailable,
                certs.is_some_and(|c| c.server_cert_available()),
            ),
            (
                Gate::ClientCertAvailable,
                certs.is_some_and(|c| c.client_cert_available()),
            ),
            (Gate::LoadBalancerAvailable, self.has(RelationKind::LoadBalancer)),
            (Gate::CephStorageAvailable, self.has(RelationKind::Ceph)),
            (Gate::CniConnected, self.cni_connected),
            (Gate::ClusterDnsConnected, self.cluster_dns_connected),
            (Gate::KubeApiConnected, self.kube_api_connected),
            (
                Gate::KubeApiEndpointAvailable,
                self.kube_api_endpoint_connected,
            ),
        ]
    }
}

/// Data this unit sends to a related application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "relation", rename_all = "kebab-case")]
pub enum Publication {
    Cni {
        is_master: bool,
        kubeconfig_path: String,
    },
    ClusterDns {
        port: u16,
        domain: String,
        sdn_ip: Ipv4Addr,
    },
    KubeApiEndpoint {
        port: u16,
    },
    KubeApi {
        port: String,
    },
    ServerCertRequest {
        common_name: String,
        sans: Vec<String>,
        certificate_name: String,
    },
}
