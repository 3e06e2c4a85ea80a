//! Shared fixtures for rule tests: a scratch layout, in-memory state and the
//! recording doubles.

use std::path::PathBuf;

use tempfile::TempDir;

use crate::convergence::{Context, Outcome, PassReport, RuleBody, RulesEngine};
use crate::error::ConvergeError;
use crate::infrastructure::{MockRunner, RecordingRenderer};
use crate::state::ClusterState;
use crate::types::{
    CephRelation, CertificatesRelation, EtcdRelation, Layout, Publication, RelationSnapshot,
    Settings, UnitInfo,
};

pub struct Harness {
    pub dir: TempDir,
    pub state: ClusterState,
    pub settings: Settings,
    pub relations: RelationSnapshot,
    pub runner: MockRunner,
    pub renderer: RecordingRenderer,
}

impl Harness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            layout: Layout::rooted(dir.path()),
            ..Settings::default()
        };
        let relations = RelationSnapshot {
            unit: UnitInfo {
                name: "kubernetes-master/0".into(),
                public_address: "54.1.2.3".into(),
                private_address: "172.31.0.5".into(),
                hostname: "ip-172-31-0-5".into(),
            },
            ..RelationSnapshot::default()
        };
        let runner = MockRunner::new();
        runner.respond("dpkg --print-architecture", "amd64\n");
        Harness {
            dir,
            state: ClusterState::in_memory(),
            settings,
            relations,
            runner,
            renderer: RecordingRenderer::new(),
        }
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Write `contents` to a file under the scratch root and return its path.
    pub fn file(&self, rel: &str, contents: &str) -> String {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path.display().to_string()
    }

    pub fn with_etcd(&mut self, connection_string: &str) -> &mut Self {
        self.relations.etcd = Some(EtcdRelation {
            connection_string: connection_string.into(),
            client_ca: "CA PEM".into(),
            client_key: "KEY PEM".into(),
            client_cert: "CERT PEM".into(),
        });
        self
    }

    /// Certificates relation with every path present on disk.
    pub fn with_certificates(&mut self) -> &mut Self {
        let certs = CertificatesRelation {
            ca_path: Some(self.file("tls/ca.crt", "ca")),
            server_cert_path: Some(self.file("tls/server.crt", "server cert")),
            server_key_path: Some(self.file("tls/server.key", "server key")),
            client_cert_path: Some(self.file("tls/client.crt", "client cert")),
            client_key_path: Some(self.file("tls/client.key", "client key")),
        };
        self.relations.certificates = Some(certs);
        self
    }

    pub fn with_ceph(&mut self, key: Option<&str>) -> &mut Self {
        self.relations.ceph = Some(CephRelation {
            mon_hosts: vec!["10.0.0.21:6789".into(), "10.0.0.22:6789".into()],
            fsid: "2f7a4c3e-9d1b-11e6-8f3c-00163e4d2a1b".into(),
            auth: "cephx".into(),
            key: key.map(str::to_string),
        });
        self
    }

    /// Run one rule body directly, bypassing its gate conditions.
    pub fn fire(&mut self, body: RuleBody) -> Result<Outcome, ConvergeError> {
        self.fire_collect(body).0
    }

    pub fn fire_collect(
        &mut self,
        body: RuleBody,
    ) -> (Result<Outcome, ConvergeError>, Vec<Publication>) {
        let mut ctx = Context::new(
            &mut self.state,
            &self.settings,
            &self.relations,
            &self.runner,
            &self.renderer,
        );
        let outcome = body(&mut ctx);
        (outcome, ctx.publications)
    }

    pub fn pass(&mut self, engine: &RulesEngine) -> Result<PassReport, ConvergeError> {
        let mut ctx = Context::new(
            &mut self.state,
            &self.settings,
            &self.relations,
            &self.runner,
            &self.renderer,
        );
        engine.evaluate(&mut ctx)
    }
}
