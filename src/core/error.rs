// src/core/error.rs

use thiserror::Error;

use crate::core::timeout::TIMEOUT_MARKER;

/// Errors raised by the engine itself, before or around a scan session.
///
/// Probe failures never surface here: they end up in a job's state instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("no address was given")]
    EmptyAddress,

    #[error("'{0}' is not a valid URL, IPv4 or IPv6 address")]
    InvalidAddress(String),

    #[error("unknown job '{0}'")]
    UnknownJob(String),

    #[error("job '{0}' is still loading")]
    JobBusy(String),
}

impl ScanError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ScanError::EmptyAddress | ScanError::InvalidAddress(_))
    }
}

/// Failure reported by a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0}")]
    Failed(String),

    /// The remote service the probe talks to gave up on its own deadline.
    #[error("{0}")]
    RemoteTimeout(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DNS error: {0}")]
    Dns(#[from] hickory_resolver::error::ResolveError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("could not encode probe result: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProbeError {
    pub fn failed(message: impl Into<String>) -> Self {
        ProbeError::Failed(message.into())
    }

    pub fn is_remote_timeout(&self) -> bool {
        match self {
            ProbeError::RemoteTimeout(_) => true,
            ProbeError::Http(e) => e.is_timeout(),
            ProbeError::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            ProbeError::Failed(message) => message.contains(TIMEOUT_MARKER),
            _ => false,
        }
    }
}
