// src/core/models.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumCount, EnumIter, EnumString};
use tokio::time::Instant;
use url::Url;

use crate::core::address::classify;
use crate::core::error::ScanError;

// --- Address Models ---

/// The shape of a raw target string, as decided by [`classify`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AddressKind {
    Url,
    Ipv4,
    Ipv6,
    Empty,
    Invalid,
}

impl AddressKind {
    /// Whether a scan session may be opened for this kind.
    pub fn is_scannable(self) -> bool {
        matches!(self, AddressKind::Url | AddressKind::Ipv4 | AddressKind::Ipv6)
    }
}

/// An immutable, classified scan target.
///
/// Only scannable kinds can be held in an `Address`; empty and invalid input is
/// rejected by [`Address::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    raw: String,
    kind: AddressKind,
}

impl Address {
    pub fn parse(raw: &str) -> Result<Self, ScanError> {
        let raw = raw.trim();
        match classify(raw) {
            AddressKind::Empty => Err(ScanError::EmptyAddress),
            AddressKind::Invalid => Err(ScanError::InvalidAddress(raw.to_string())),
            AddressKind::Ipv6 => Ok(Self {
                raw: raw.trim_start_matches('[').trim_end_matches(']').to_string(),
                kind: AddressKind::Ipv6,
            }),
            kind => Ok(Self { raw: raw.to_string(), kind }),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// The target as an absolute URL, assuming `https://` when no scheme was typed.
    pub fn url(&self) -> String {
        match self.kind {
            AddressKind::Ipv6 => format!("https://[{}]", self.raw),
            _ if self.raw.starts_with("http") => self.raw.clone(),
            _ => format!("https://{}", self.raw),
        }
    }

    /// The bare host name or IP literal, without scheme, port or path.
    pub fn host(&self) -> String {
        match self.kind {
            AddressKind::Ipv4 | AddressKind::Ipv6 => self.raw.clone(),
            _ => Url::parse(&self.url())
                .ok()
                .and_then(|url| url.host_str().map(String::from))
                .unwrap_or_else(|| self.raw.clone()),
        }
    }
}

// --- Job State Models ---

/// The lifecycle state of one job within a scan session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumCount,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum JobStatus {
    Loading,
    Success,
    Error,
    Skipped,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        self != JobStatus::Loading
    }
}

/// The tagged result of one probe attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Error { message: String, remote_timeout: bool },
    Skipped { reason: String },
    TimedOut { message: String },
}

impl Outcome {
    pub fn error(message: impl Into<String>) -> Self {
        Outcome::Error { message: message.into(), remote_timeout: false }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped { reason: reason.into() }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            Outcome::Success(_) => JobStatus::Success,
            Outcome::Error { .. } => JobStatus::Error,
            Outcome::Skipped { .. } => JobStatus::Skipped,
            Outcome::TimedOut { .. } => JobStatus::TimedOut,
        }
    }

    /// The HTTP status a calling surface reports for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Success(_) | Outcome::Skipped { .. } => 200,
            Outcome::Error { remote_timeout: true, .. } | Outcome::TimedOut { .. } => 408,
            Outcome::Error { .. } => 500,
        }
    }

    /// The JSON body a calling surface returns for this outcome.
    pub fn body(&self) -> Value {
        match self {
            Outcome::Success(payload) => payload.clone(),
            Outcome::Error { message, .. } | Outcome::TimedOut { message } => {
                serde_json::json!({ "error": message })
            }
            Outcome::Skipped { reason } => serde_json::json!({ "skipped": reason }),
        }
    }
}

/// The mutable record of one job in one scan session.
#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    pub id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Incremented by every retry; results carrying an older attempt are discarded.
    pub attempt: u32,
    #[serde(skip)]
    pub(crate) started_at: Instant,
}

impl JobState {
    pub(crate) fn loading(id: &str, started_at: Instant) -> Self {
        Self {
            id: id.to_string(),
            status: JobStatus::Loading,
            error: None,
            elapsed_ms: None,
            result: None,
            attempt: 0,
            started_at,
        }
    }

    /// Retry is offered for every finished job that did not succeed.
    pub fn can_retry(&self) -> bool {
        matches!(self.status, JobStatus::Error | JobStatus::TimedOut | JobStatus::Skipped)
    }
}
