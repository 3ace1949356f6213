// src/core/probes/mod.rs

// The built-in checks. Each submodule exposes plain async functions taking an
// `Address`; `default_catalogue` wires them into job definitions together with
// the address kinds they apply to.
pub mod dns;
pub mod fingerprint;
pub mod http;
pub mod network;
pub mod tls;

use std::sync::Arc;
use std::time::Duration;

use crate::core::catalogue::{Catalogue, JobDefinition, probe_fn};
use crate::core::error::ProbeError;
use crate::core::models::AddressKind;

const URL_ONLY: &[AddressKind] = &[AddressKind::Url];
const IP_ONLY: &[AddressKind] = &[AddressKind::Ipv4, AddressKind::Ipv6];
const ANY_HOST: &[AddressKind] = &[AddressKind::Url, AddressKind::Ipv4, AddressKind::Ipv6];

/// User agent sent by every HTTP-based probe.
pub const USER_AGENT: &str = concat!("VanguardWebcheck/", env!("CARGO_PKG_VERSION"));

/// Ports tried by the `ports` probe unless configured otherwise.
pub const DEFAULT_PORTS: &[u16] = &[
    20, 21, 22, 23, 25, 53, 80, 67, 68, 69, 110, 119, 123, 143, 156, 161, 162, 179, 194, 389, 443,
    587, 993, 995, 3000, 3306, 3389, 5060, 5900, 8000, 8080, 8888,
];

/// Tunables for the built-in probes.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub ports: Vec<u16>,
    pub port_timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            port_timeout: Duration::from_millis(1500),
        }
    }
}

/// Builds the catalogue of every built-in job, in display order.
pub fn default_catalogue(settings: &ProbeSettings) -> Catalogue {
    let ports = Arc::new(settings.ports.clone());
    let port_timeout = settings.port_timeout;

    Catalogue::new([
        JobDefinition::new("get-ip", URL_ONLY, probe_fn(|a| async move { network::get_ip(&a).await })),
        JobDefinition::new("dns", URL_ONLY, probe_fn(|a| async move { dns::records(&a).await })),
        JobDefinition::new("mail-config", URL_ONLY, probe_fn(|a| async move { dns::mail_config(&a).await })),
        JobDefinition::new("ssl", URL_ONLY, probe_fn(|a| async move { tls::certificate(&a).await })),
        JobDefinition::new("headers", URL_ONLY, probe_fn(|a| async move { http::headers(&a).await })),
        JobDefinition::new("http-security", URL_ONLY, probe_fn(|a| async move { http::security_headers(&a).await })),
        JobDefinition::new("tech-stack", URL_ONLY, probe_fn(|a| async move { fingerprint::tech_stack(&a).await })),
        JobDefinition::new("status", URL_ONLY, probe_fn(|a| async move { http::status(&a).await })),
        JobDefinition::new("robots-txt", URL_ONLY, probe_fn(|a| async move { http::robots_txt(&a).await })),
        JobDefinition::new(
            "ports",
            ANY_HOST,
            probe_fn(move |a| {
                let ports = ports.clone();
                async move { network::open_ports(&a, &ports, port_timeout).await }
            }),
        ),
        JobDefinition::new("reverse-dns", IP_ONLY, probe_fn(|a| async move { dns::reverse(&a).await })),
    ])
}

/// Shared HTTP client settings for the probes.
pub(crate) fn http_client() -> Result<reqwest::Client, ProbeError> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_ids_are_unique_and_ordered() {
        let catalogue = default_catalogue(&ProbeSettings::default());
        assert_eq!(catalogue.len(), 11);
        assert_eq!(catalogue.ids().next(), Some("get-ip"));
    }

    #[test]
    fn applicability_by_kind() {
        let catalogue = default_catalogue(&ProbeSettings::default());
        let for_kind = |kind| catalogue.iter().filter(|job| job.applies_to(kind)).count();
        assert_eq!(for_kind(AddressKind::Url), 10);
        assert_eq!(for_kind(AddressKind::Ipv4), 2);
        assert_eq!(for_kind(AddressKind::Ipv6), 2);
    }
}
