//! Addresses derived from the service CIDR.

use std::net::Ipv4Addr;

use crate::error::ConvergeError;

/// Network address of `cidr` (the part before the slash).
fn base_address(cidr: &str) -> Result<Ipv4Addr, ConvergeError> {
    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| ConvergeError::InvalidCidr(cidr.to_string()))?;
    let prefix_ok = prefix.parse::<u8>().is_ok_and(|p| p <= 32);
    match addr.parse::<Ipv4Addr>() {
        Ok(ip) if prefix_ok => Ok(ip),
        _ => Err(ConvergeError::InvalidCidr(cidr.to_string())),
    }
}

/// The base address of `cidr` with its last octet replaced by `host`.
fn with_last_octet(cidr: &str, host: u8) -> Result<Ipv4Addr, ConvergeError> {
    let [a, b, c, _] = base_address(cidr)?.octets();
    Ok(Ipv4Addr::new(a, b, c, host))
}

/// Where the cluster DNS service lives: `x.y.z.10`.
pub fn dns_ip(cidr: &str) -> Result<Ipv4Addr, ConvergeError> {
    with_last_octet(cidr, 10)
}

/// The in-cluster `kubernetes` service address: `x.y.z.1`.
pub fn kubernetes_service_ip(cidr: &str) -> Result<Ipv4Addr, ConvergeError> {
    with_last_octet(cidr, 1)
}
