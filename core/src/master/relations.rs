//! Data published to related applications.

use crate::convergence::{Context, Outcome, Rule};
use crate::error::ConvergeError;
use crate::types::{Gate, Publication, RelationKind};

use super::network;

const DNS_PORT: u16 = 53;

pub const CONFIGURE_CNI: Rule = Rule {
    name: "configure_cni",
    when: &[Gate::CniConnected],
    when_not: &[Gate::CniConfigured],
    inputs: &[RelationKind::Cni],
    body: configure_cni,
};

pub const SEND_CLUSTER_DNS_DETAIL: Rule = Rule {
    name: "send_cluster_dns_detail",
    when: &[Gate::ClusterDnsConnected],
    when_not: &[],
    inputs: &[RelationKind::ClusterDns],
    body: send_cluster_dns_detail,
};

pub const PUSH_SERVICE_DATA: Rule = Rule {
    name: "push_service_data",
    when: &[Gate::KubeApiEndpointAvailable],
    when_not: &[],
    inputs: &[RelationKind::KubeApiEndpoint],
    body: push_service_data,
};

pub const SEND_CERT_REQUEST: Rule = Rule {
    name: "send_cert_request",
    when: &[Gate::CertificatesAvailable],
    when_not: &[],
    inputs: &[RelationKind::Certificates],
    body: send_cert_request,
};

pub const PUSH_API_DATA: Rule = Rule {
    name: "push_api_data",
    when: &[Gate::KubeApiConnected],
    when_not: &[],
    inputs: &[RelationKind::KubeApi],
    body: push_api_data,
};

/// Tell the CNI subordinate it runs on a master.
fn configure_cni(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    ctx.publish(Publication::Cni {
        is_master: true,
        kubeconfig_path: String::new(),
    });
    ctx.set_gate(Gate::CniConfigured)?;
    Ok(Outcome::Converged)
}

/// The DNS service address is known from the CIDR before DNS is deployed.
fn send_cluster_dns_detail(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let sdn_ip = network::dns_ip(&ctx.service_cidr())?;
    ctx.publish(Publication::ClusterDns {
        port: DNS_PORT,
        domain: ctx.settings.dns_domain.clone(),
        sdn_ip,
    });
    Ok(Outcome::Converged)
}

fn push_service_data(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    ctx.publish(Publication::KubeApiEndpoint {
        port: ctx.settings.api_port,
    });
    Ok(Outcome::Converged)
}

fn push_api_data(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    ctx.publish(Publication::KubeApi {
        port: ctx.settings.api_port.to_string(),
    });
    Ok(Outcome::Converged)
}

/// Subject alternative names for the apiserver certificate.
pub fn server_sans(
    public_address: &str,
    private_address: &str,
    hostname: &str,
    service_ip: &str,
    domain: &str,
) -> Vec<String> {
    vec![
        public_address.to_string(),
        private_address.to_string(),
        hostname.to_string(),
        service_ip.to_string(),
        "kubernetes".to_string(),
        format!("kubernetes.{}", domain),
        "kubernetes.default".to_string(),
        "kubernetes.default.svc".to_string(),
        format!("kubernetes.default.svc.{}", domain),
    ]
}

fn send_cert_request(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    let unit = &ctx.relations.unit;
    let service_ip = network::kubernetes_service_ip(&ctx.service_cidr())?;
    let sans = server_sans(
        &unit.public_address,
        &unit.private_address,
        &unit.hostname,
        &service_ip.to_string(),
        &ctx.settings.dns_domain,
    );
    let request = Publication::ServerCertRequest {
        common_name: unit.public_address.clone(),
        sans,
        certificate_name: unit.name.replace('/', "_"),
    };
    ctx.publish(request);
    Ok(Outcome::Converged)
}
