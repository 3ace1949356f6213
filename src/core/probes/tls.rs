// src/core/probes/tls.rs

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use serde::Serialize;
use tokio::task::spawn_blocking;
use tracing::{debug, error, info};
use x509_parser::prelude::*;

use crate::core::catalogue::ProbeReply;
use crate::core::error::ProbeError;
use crate::core::models::Address;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub days_until_expiry: i64,
    pub is_valid: bool,
}

/// Connects on port 443 and reports the peer certificate.
///
/// The handshake is blocking, so it runs on the blocking pool.
pub async fn certificate(address: &Address) -> Result<ProbeReply, ProbeError> {
    let host = address.host();
    info!(target = %host, "Starting SSL/TLS scan.");

    let info = spawn_blocking(move || perform_tls_scan(&host))
        .await
        .map_err(|e| {
            error!(panic = %e, "Blocking SSL scan task panicked!");
            ProbeError::failed(format!("Task panicked: {e}"))
        })??;

    info!(days_until_expiry = info.days_until_expiry, valid = info.is_valid, "SSL/TLS scan finished.");
    ProbeReply::data(&info)
}

fn perform_tls_scan(host: &str) -> Result<CertificateInfo, ProbeError> {
    let connector =
        TlsConnector::new().map_err(|e| ProbeError::failed(format!("TlsConnector Error: {e}")))?;

    let addr = (host, 443)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ProbeError::failed(format!("No address found for {host}")))?;
    debug!(%addr, "Connecting TCP stream to port 443.");
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
    stream.set_read_timeout(Some(CONNECT_TIMEOUT))?;

    debug!(host, "Performing TLS handshake.");
    let stream = connector
        .connect(host, stream)
        .map_err(|e| ProbeError::failed(format!("TLS Handshake Error: {e}")))?;

    let cert = stream
        .peer_certificate()
        .map_err(|e| ProbeError::failed(format!("Could not get peer certificate: {e}")))?
        .ok_or_else(|| ProbeError::failed("No certificate presented by the server"))?;
    let cert_der = cert
        .to_der()
        .map_err(|e| ProbeError::failed(format!("Could not convert certificate to DER: {e}")))?;

    let (_, x509) = parse_x509_certificate(&cert_der)
        .map_err(|e| ProbeError::failed(format!("X.509 Parse Error: {e}")))?;
    debug!(subject = %x509.subject(), issuer = %x509.issuer(), "Parsed certificate.");

    let validity = x509.validity();
    let not_before = asn1_time_to_chrono_utc(&validity.not_before);
    let not_after = asn1_time_to_chrono_utc(&validity.not_after);
    let now = Utc::now();

    Ok(CertificateInfo {
        subject: x509.subject().to_string(),
        issuer: x509.issuer().to_string(),
        serial_number: x509.raw_serial_as_string(),
        not_before,
        not_after,
        days_until_expiry: not_after.signed_duration_since(now).num_days(),
        is_valid: now > not_before && now < not_after,
    })
}

fn asn1_time_to_chrono_utc(time: &ASN1Time) -> DateTime<Utc> {
    DateTime::from_timestamp(time.timestamp(), 0).unwrap_or_default()
}
