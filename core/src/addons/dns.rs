use serde_json::json;

use super::create_addon;
use crate::convergence::{Context, Outcome, Rule};
use crate::error::ConvergeError;
use crate::infrastructure::host;
use crate::master::network;
use crate::types::{Gate, StatusLevel};

pub const DNS_TEMPLATES: [&str; 2] = ["kubedns-controller.yaml", "kubedns-svc.yaml"];

pub const START_KUBE_DNS: Rule = Rule {
    name: "start_kube_dns",
    when: &[Gate::ComponentsStarted],
    when_not: &[Gate::KubeDnsAvailable],
    inputs: &[],
    body: start_kube_dns,
};

fn start_kube_dns(ctx: &mut Context<'_>) -> Result<Outcome, ConvergeError> {
    ctx.set_status(StatusLevel::Maintenance, "Deploying KubeDNS")?;

    let context = json!({
        "arch": host::arch(ctx.runner)?,
        "pillar": {
            "dns_server": network::dns_ip(&ctx.service_cidr())?.to_string(),
            "dns_replicas": 1,
            "dns_domain": ctx.settings.dns_domain,
        },
    });

    for template in DNS_TEMPLATES {
        match create_addon(ctx.runner, ctx.renderer, &ctx.settings.layout, template, &context) {
            Ok(()) => {}
            Err(e) if e.is_command_failure() => {
                ctx.set_status(StatusLevel::Waiting, "Waiting to retry KubeDNS deployment")?;
                return Ok(Outcome::Waiting(e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    ctx.set_gate(Gate::KubeDnsAvailable)?;
    Ok(Outcome::Converged)
}
