// src/core/probes/dns.rs

use std::net::IpAddr;

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::rr::RecordType;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::catalogue::ProbeReply;
use crate::core::error::ProbeError;
use crate::core::models::Address;

/// A list of common DKIM selectors to check for when a specific one is not known.
const COMMON_DKIM_SELECTORS: &[&str] = &["google", "selector1", "selector2", "default", "dkim"];

/// TXT record prefixes left behind by mail providers when verifying a domain.
const MAIL_PROVIDER_MARKERS: &[(&str, &str)] = &[
    ("protonmail-verification=", "ProtonMail"),
    ("google-site-verification=", "Google Workspace"),
    ("MS=", "Microsoft 365"),
    ("zoho-verification=", "Zoho"),
    ("titan-verification=", "Titan"),
];

/// MX hosts that give away the mail provider.
const MAIL_PROVIDER_MX: &[(&str, &str)] = &[("yahoodns.net", "Yahoo"), ("mimecast.com", "Mimecast")];

#[derive(Debug, Serialize)]
pub struct MxRecord {
    pub exchange: String,
    pub priority: u16,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct DnsRecords {
    pub a: Vec<String>,
    pub aaaa: Vec<String>,
    pub mx: Vec<MxRecord>,
    pub txt: Vec<String>,
    pub ns: Vec<String>,
    pub cname: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DkimRecord {
    pub selector: String,
    pub record: String,
}

#[derive(Debug, Serialize)]
pub struct MailService {
    pub provider: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MailConfig {
    pub mx_records: Vec<MxRecord>,
    pub spf: Option<String>,
    pub dmarc: Option<String>,
    pub dmarc_policy: Option<String>,
    pub dkim: Vec<DkimRecord>,
    pub txt_records: Vec<String>,
    pub mail_services: Vec<MailService>,
}

fn resolver() -> TokioAsyncResolver {
    TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
}

fn is_no_records(e: &ResolveError) -> bool {
    matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

/// Strips "www." so mail records are looked up on the registrable domain.
fn root_domain(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Looks up the common record types of a host.
///
/// The host must resolve at all; individual record types that are missing or
/// fail come back as empty lists.
pub async fn records(address: &Address) -> Result<ProbeReply, ProbeError> {
    let host = address.host();
    info!(target = %host, "Starting DNS lookup.");
    let resolver = resolver();

    resolver.lookup_ip(host.as_str()).await?;

    let (a, aaaa, mx, txt, ns, cname) = tokio::join!(
        resolver.ipv4_lookup(host.as_str()),
        resolver.ipv6_lookup(host.as_str()),
        resolver.mx_lookup(host.as_str()),
        resolver.txt_lookup(host.as_str()),
        resolver.ns_lookup(host.as_str()),
        resolver.lookup(host.as_str(), RecordType::CNAME),
    );

    let records = DnsRecords {
        a: a.map(|l| l.iter().map(|r| r.to_string()).collect()).unwrap_or_default(),
        aaaa: aaaa.map(|l| l.iter().map(|r| r.to_string()).collect()).unwrap_or_default(),
        mx: mx
            .map(|l| {
                l.iter()
                    .map(|r| MxRecord { exchange: r.exchange().to_string(), priority: r.preference() })
                    .collect()
            })
            .unwrap_or_default(),
        txt: txt.map(|l| l.iter().map(|r| r.to_string()).collect()).unwrap_or_default(),
        ns: ns.map(|l| l.iter().map(|r| r.to_string()).collect()).unwrap_or_default(),
        cname: cname.map(|l| l.iter().map(|r| r.to_string()).collect()).unwrap_or_default(),
    };
    debug!(a = records.a.len(), mx = records.mx.len(), txt = records.txt.len(), "DNS lookup finished.");
    ProbeReply::data(&records)
}

/// Inspects the mail setup of a domain: MX hosts, SPF, DMARC, DKIM and provider hints.
///
/// A domain without MX records is skipped rather than failed.
pub async fn mail_config(address: &Address) -> Result<ProbeReply, ProbeError> {
    let host = address.host();
    let domain = root_domain(&host);
    info!(target = %domain, "Starting mail configuration scan.");
    let resolver = resolver();

    let mx_records: Vec<MxRecord> = match resolver.mx_lookup(domain).await {
        Ok(lookup) => lookup
            .iter()
            .map(|r| MxRecord { exchange: r.exchange().to_string(), priority: r.preference() })
            .collect(),
        Err(e) if is_no_records(&e) => {
            return Ok(ProbeReply::Skip("No mail server in use on this domain".into()));
        }
        Err(e) => return Err(e.into()),
    };

    let (txt, dmarc, dkim) = tokio::join!(
        lookup_txt(&resolver, domain),
        lookup_dmarc(&resolver, domain),
        lookup_dkim(&resolver, domain),
    );

    let spf = txt.iter().find(|r| r.starts_with("v=spf1")).cloned();
    let dmarc_policy = dmarc.as_deref().and_then(dmarc_policy);
    let mail_services = mail_services(&txt, &mx_records);
    let txt_records = txt
        .into_iter()
        .filter(|r| r.starts_with("v=spf1") || r.contains("bluehost.com") || provider_marker(r).is_some())
        .collect();

    let config = MailConfig { mx_records, spf, dmarc, dmarc_policy, dkim, txt_records, mail_services };
    info!(
        mx = config.mx_records.len(),
        dkim = config.dkim.len(),
        services = config.mail_services.len(),
        "Mail configuration scan finished."
    );
    ProbeReply::data(&config)
}

/// Resolves the host names an IP address points back to.
pub async fn reverse(address: &Address) -> Result<ProbeReply, ProbeError> {
    let ip: IpAddr = address
        .host()
        .parse()
        .map_err(|_| ProbeError::failed(format!("'{}' is not an IP address", address.raw())))?;
    debug!(%ip, "Reverse lookup.");

    match resolver().reverse_lookup(ip).await {
        Ok(lookup) => {
            let hostnames: Vec<String> = lookup.iter().map(|ptr| ptr.to_string()).collect();
            ProbeReply::data(&serde_json::json!({ "hostnames": hostnames }))
        }
        Err(e) if is_no_records(&e) => Ok(ProbeReply::Skip(format!("No PTR record for {ip}"))),
        Err(e) => Err(e.into()),
    }
}

async fn lookup_txt(resolver: &TokioAsyncResolver, domain: &str) -> Vec<String> {
    match resolver.txt_lookup(domain).await {
        Ok(records) => records.iter().map(|r| r.to_string()).collect(),
        Err(e) => {
            warn!(target = domain, error = %e, "TXT lookup failed.");
            Vec::new()
        }
    }
}

/// DMARC records live in a TXT record at the `_dmarc` subdomain.
async fn lookup_dmarc(resolver: &TokioAsyncResolver, domain: &str) -> Option<String> {
    let dmarc_target = format!("_dmarc.{domain}");
    match resolver.txt_lookup(dmarc_target.as_str()).await {
        Ok(records) => records
            .iter()
            .map(|r| r.to_string())
            .find(|r| r.starts_with("v=DMARC1")),
        Err(e) => {
            debug!(target = %dmarc_target, error = %e, "DMARC lookup failed.");
            None
        }
    }
}

/// DKIM records are stored in TXT records at `selector._domainkey.domain`.
async fn lookup_dkim(resolver: &TokioAsyncResolver, domain: &str) -> Vec<DkimRecord> {
    let mut found = Vec::new();
    for selector in COMMON_DKIM_SELECTORS {
        let dkim_target = format!("{selector}._domainkey.{domain}");
        match resolver.txt_lookup(dkim_target.as_str()).await {
            Ok(records) => found.extend(
                records
                    .iter()
                    .map(|r| r.to_string())
                    .filter(|r| r.starts_with("v=DKIM1"))
                    .map(|record| DkimRecord { selector: selector.to_string(), record }),
            ),
            // Most selectors do not exist on any given domain.
            Err(e) => debug!(selector, error = %e, "No DKIM record for selector."),
        }
    }
    found
}

fn dmarc_policy(record: &str) -> Option<String> {
    record
        .split(';')
        .map(str::trim)
        .find_map(|tag| tag.strip_prefix("p="))
        .map(str::to_string)
}

fn provider_marker(record: &str) -> Option<(&'static str, String)> {
    MAIL_PROVIDER_MARKERS.iter().find_map(|(prefix, provider)| {
        record
            .strip_prefix(prefix)
            .map(|value| (*provider, value.to_string()))
    })
}

fn mail_services(txt: &[String], mx: &[MxRecord]) -> Vec<MailService> {
    let mut services: Vec<MailService> = txt
        .iter()
        .filter_map(|record| {
            if let Some((provider, value)) = provider_marker(record) {
                Some(MailService { provider: provider.into(), value })
            } else if record.contains("bluehost.com") {
                Some(MailService { provider: "BlueHost".into(), value: record.clone() })
            } else {
                None
            }
        })
        .collect();

    for (needle, provider) in MAIL_PROVIDER_MX {
        if let Some(record) = mx.iter().find(|r| r.exchange.contains(needle)) {
            services.push(MailService { provider: provider.to_string(), value: record.exchange.clone() });
        }
    }
    services
}
