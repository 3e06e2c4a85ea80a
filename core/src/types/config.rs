use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Operator-facing configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub service_cidr: String,
    pub dns_domain: String,
    pub enable_dashboard_addons: bool,
    pub api_port: u16,
    pub layout: Layout,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            service_cidr: "10.152.183.0/24".into(),
            dns_domain: "cluster.local".into(),
            enable_dashboard_addons: true,
            api_port: 6443,
            layout: Layout::default(),
        }
    }
}

/// Filesystem locations the rules read from and write to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Layout {
    /// Holds auth files and the service-account key.
    pub cdk_dir: PathBuf,
    pub addons_dir: PathBuf,
    pub etcd_dir: PathBuf,
    pub kubeconfig_dir: PathBuf,
    pub kubeconfig_owner: String,
    pub ceph_dir: PathBuf,
    pub unit_dir: PathBuf,
    pub defaults_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            cdk_dir: "/root/cdk".into(),
            addons_dir: "/root/cdk/addons".into(),
            etcd_dir: "/root/cdk/etcd".into(),
            kubeconfig_dir: "/home/ubuntu".into(),
            kubeconfig_owner: "ubuntu".into(),
            ceph_dir: "/etc/ceph".into(),
            unit_dir: "/lib/systemd/system".into(),
            defaults_dir: "/etc/default".into(),
            staging_dir: "/tmp".into(),
        }
    }
}

impl Layout {
    /// A layout with every directory placed under `root`. Used by tests and
    /// by operators running against a scratch tree.
    pub fn rooted(root: &Path) -> Self {
        Layout {
            cdk_dir: root.join("cdk"),
            addons_dir: root.join("cdk/addons"),
            etcd_dir: root.join("cdk/etcd"),
            kubeconfig_dir: root.join("home"),
            kubeconfig_owner: "ubuntu".into(),
            ceph_dir: root.join("ceph"),
            unit_dir: root.join("systemd"),
            defaults_dir: root.join("default"),
            staging_dir: root.join("tmp"),
        }
    }

    pub fn basic_auth_file(&self) -> PathBuf {
        self.cdk_dir.join("basic_auth.csv")
    }

    pub fn known_tokens_file(&self) -> PathBuf {
        self.cdk_dir.join("known_tokens.csv")
    }

    pub fn service_account_key(&self) -> PathBuf {
        self.cdk_dir.join("serviceaccount.key")
    }

    pub fn kubeconfig(&self) -> PathBuf {
        self.kubeconfig_dir.join("config")
    }
}
