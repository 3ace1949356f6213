// src/core/probes/network.rs

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, info};

use crate::core::catalogue::ProbeReply;
use crate::core::error::ProbeError;
use crate::core::models::Address;

#[derive(Debug, Serialize)]
pub struct IpInfo {
    pub ip: String,
    pub family: u8,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortReport {
    pub open_ports: Vec<u16>,
    pub failed_ports: Vec<u16>,
}

/// Resolves the host to its first IP address.
pub async fn get_ip(address: &Address) -> Result<ProbeReply, ProbeError> {
    let ip = resolve(address).await?;
    debug!(%ip, "Resolved address.");
    ProbeReply::data(&IpInfo {
        ip: ip.to_string(),
        family: if ip.is_ipv4() { 4 } else { 6 },
    })
}

/// Tries a TCP connect on every port at once, each bounded by `per_port`.
pub async fn open_ports(
    address: &Address,
    ports: &[u16],
    per_port: Duration,
) -> Result<ProbeReply, ProbeError> {
    let ip = resolve(address).await?;
    info!(%ip, ports = ports.len(), "Starting port scan.");

    let mut set = JoinSet::new();
    for &port in ports {
        set.spawn(async move {
            let addr = SocketAddr::new(ip, port);
            let open = matches!(time::timeout(per_port, TcpStream::connect(addr)).await, Ok(Ok(_)));
            (port, open)
        });
    }

    let mut report = PortReport::default();
    while let Some(joined) = set.join_next().await {
        let Ok((port, open)) = joined else { continue };
        if open {
            report.open_ports.push(port);
        } else {
            report.failed_ports.push(port);
        }
    }
    report.open_ports.sort_unstable();
    report.failed_ports.sort_unstable();

    info!(open = report.open_ports.len(), "Port scan finished.");
    if report.open_ports.is_empty() {
        return Err(ProbeError::failed("No open ports found"));
    }
    ProbeReply::data(&report)
}

async fn resolve(address: &Address) -> Result<IpAddr, ProbeError> {
    let host = address.host();
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }
    tokio::net::lookup_host((host.as_str(), 80))
        .await?
        .map(|addr| addr.ip())
        .next()
        .ok_or_else(|| ProbeError::failed(format!("No address found for {host}")))
}
