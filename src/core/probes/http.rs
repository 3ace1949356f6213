// src/core/probes/http.rs

use std::collections::BTreeMap;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::catalogue::ProbeReply;
use crate::core::error::ProbeError;
use crate::core::models::Address;
use crate::core::probes::http_client;

static RE_ROBOTS_RULE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(Allow|Disallow|User-agent):\s*(\S*)$").unwrap());

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityHeaders {
    pub strict_transport_policy: bool,
    pub x_frame_options: bool,
    pub x_content_type_options: bool,
    #[serde(rename = "xXSSProtection")]
    pub x_xss_protection: bool,
    pub content_security_policy: bool,
}

impl SecurityHeaders {
    fn from_headers(headers: &HeaderMap) -> Self {
        let present = |name: &str| {
            let found = headers.contains_key(name);
            debug!(header_name = name, found, "Checked security header.");
            found
        };
        Self {
            strict_transport_policy: present("strict-transport-security"),
            x_frame_options: present("x-frame-options"),
            x_content_type_options: present("x-content-type-options"),
            x_xss_protection: present("x-xss-protection"),
            content_security_policy: present("content-security-policy"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    pub is_up: bool,
    pub response_code: u16,
    pub dns_lookup_time: u64,
    pub response_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RobotsRule {
    pub lbl: String,
    pub val: String,
}

/// Returns every response header, whatever the status code.
pub async fn headers(address: &Address) -> Result<ProbeReply, ProbeError> {
    let url = address.url();
    info!(url = %url, "Fetching response headers.");
    let response = http_client()?.get(&url).send().await?;
    info!(status = %response.status(), "Received HTTP response for headers scan.");

    let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().map(str::to_string).unwrap_or_else(|_| {
                warn!(header_name = %name, "Header contained invalid UTF-8.");
                "[Invalid UTF-8]".to_string()
            });
            (name.to_string(), value)
        })
        .collect();
    ProbeReply::data(&headers)
}

/// Reports which of the common security headers the site sends.
pub async fn security_headers(address: &Address) -> Result<ProbeReply, ProbeError> {
    let url = address.url();
    info!(url = %url, "Starting security headers scan.");
    let response = http_client()?.get(&url).send().await?;
    ProbeReply::data(&SecurityHeaders::from_headers(response.headers()))
}

/// Checks the site answers with a 2xx or 3xx status and times the round trip.
pub async fn status(address: &Address) -> Result<ProbeReply, ProbeError> {
    let url = address.url();
    let host = address.host();

    let dns_started = Instant::now();
    tokio::net::lookup_host((host.as_str(), 443)).await?;
    let dns_lookup_time = dns_started.elapsed().as_millis() as u64;

    let started = Instant::now();
    let response = http_client()?.get(&url).send().await?;
    let code = response.status();
    if !(code.is_success() || code.is_redirection()) {
        return Err(ProbeError::failed(format!(
            "Received non-success response code: {}",
            code.as_u16()
        )));
    }
    response.bytes().await?;
    let response_time = started.elapsed().as_millis() as u64;

    info!(status = %code, response_time, dns_lookup_time, "Server is up.");
    ProbeReply::data(&ServerStatus {
        is_up: true,
        response_code: code.as_u16(),
        dns_lookup_time,
        response_time,
    })
}

/// Fetches and parses `/robots.txt`. A missing or empty file is a skip.
pub async fn robots_txt(address: &Address) -> Result<ProbeReply, ProbeError> {
    let parsed = url::Url::parse(&address.url())
        .map_err(|e| ProbeError::failed(format!("Invalid url: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| ProbeError::failed("Invalid url: no host"))?;
    let robots_url = format!("{}://{}/robots.txt", parsed.scheme(), host);
    debug!(url = %robots_url, "Fetching robots.txt.");

    let response = http_client()?.get(&robots_url).send().await?;
    match response.status() {
        StatusCode::OK => {}
        StatusCode::NOT_FOUND => {
            return Ok(ProbeReply::Skip("No robots.txt file present, unable to continue".into()));
        }
        other => {
            return Err(ProbeError::failed(format!(
                "Failed to fetch robots.txt: status {}",
                other.as_u16()
            )));
        }
    }

    let rules = parse_robots_txt(&response.text().await?);
    if rules.is_empty() {
        return Ok(ProbeReply::Skip("No robots.txt file present, unable to continue".into()));
    }
    info!(rules = rules.len(), "Parsed robots.txt.");
    ProbeReply::data(&serde_json::json!({ "robots": rules }))
}

fn parse_robots_txt(content: &str) -> Vec<RobotsRule> {
    content
        .lines()
        .filter_map(|line| RE_ROBOTS_RULE.captures(line.trim()))
        .map(|caps| RobotsRule { lbl: caps[1].to_string(), val: caps[2].to_string() })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn robots_rules_keep_order_and_ignore_noise() {
        let rules = parse_robots_txt(
            "# comment\nUser-agent: *\nDisallow: /admin\n  allow: /public  \nSitemap: https://x/s.xml\n",
        );
        assert_eq!(
            rules,
            vec![
                RobotsRule { lbl: "User-agent".into(), val: "*".into() },
                RobotsRule { lbl: "Disallow".into(), val: "/admin".into() },
                RobotsRule { lbl: "allow".into(), val: "/public".into() },
            ]
        );
    }

    #[test]
    fn an_empty_robots_file_has_no_rules() {
        assert!(parse_robots_txt("\n\n# nothing here\n").is_empty());
    }

    #[test]
    fn security_headers_are_presence_flags() {
        let mut headers = HeaderMap::new();
        headers.insert("strict-transport-security", HeaderValue::from_static("max-age=63072000"));
        headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
        let flags = SecurityHeaders::from_headers(&headers);
        assert!(flags.strict_transport_policy);
        assert!(flags.x_frame_options);
        assert!(!flags.content_security_policy);

        let json = serde_json::to_value(&flags).unwrap();
        assert_eq!(json["xXSSProtection"], serde_json::json!(false));
        assert_eq!(json["strictTransportPolicy"], serde_json::json!(true));
    }
}
