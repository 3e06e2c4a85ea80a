//! Plain data types shared across the engine: gates, relation snapshots,
//! settings and status.

pub mod config;
pub mod gate;
pub mod relation;
pub mod status;

pub use config::{Layout, Settings};
pub use gate::Gate;
pub use relation::{
    CephRelation, CertificatesRelation, Endpoint, EtcdRelation, LoadBalancerRelation,
    Publication, RelationKind, RelationSnapshot, UnitInfo,
};
pub use status::{Status, StatusLevel};
