// src/core/catalogue.rs

//! The static registry of jobs a scan session runs.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::error::ProbeError;
use crate::core::models::{Address, AddressKind};

/// What a probe hands back when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeReply {
    /// Opaque payload, passed through to callers untouched.
    Data(Value),
    /// The probe decided there is nothing to report for this target.
    Skip(String),
}

impl ProbeReply {
    pub fn data<T: Serialize>(payload: &T) -> Result<Self, ProbeError> {
        Ok(ProbeReply::Data(serde_json::to_value(payload)?))
    }
}

/// One read-only inspection of a target address.
///
/// Implementations perform their own network calls and may take arbitrarily
/// long; deadlines are enforced by the caller.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, address: &Address) -> Result<ProbeReply, ProbeError>;
}

type BoxedProbeFuture = Pin<Box<dyn Future<Output = Result<ProbeReply, ProbeError>> + Send>>;

struct FnProbe<F>(F);

#[async_trait]
impl<F> Probe for FnProbe<F>
where
    F: Fn(Address) -> BoxedProbeFuture + Send + Sync,
{
    async fn probe(&self, address: &Address) -> Result<ProbeReply, ProbeError> {
        (self.0)(address.clone()).await
    }
}

/// Wraps an async closure as a [`Probe`].
pub fn probe_fn<F, Fut>(f: F) -> Arc<dyn Probe>
where
    F: Fn(Address) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeReply, ProbeError>> + Send + 'static,
{
    Arc::new(FnProbe(move |address| Box::pin(f(address)) as BoxedProbeFuture))
}

/// A catalogue entry: a job id, the address kinds it applies to, and its probe.
#[derive(Clone)]
pub struct JobDefinition {
    pub id: &'static str,
    pub kinds: &'static [AddressKind],
    pub probe: Arc<dyn Probe>,
}

impl JobDefinition {
    pub fn new(id: &'static str, kinds: &'static [AddressKind], probe: Arc<dyn Probe>) -> Self {
        Self { id, kinds, probe }
    }

    pub fn applies_to(&self, kind: AddressKind) -> bool {
        self.kinds.contains(&kind)
    }
}

impl fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDefinition")
            .field("id", &self.id)
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

/// Ordered, immutable set of job definitions with unique ids.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    jobs: Vec<JobDefinition>,
}

impl Catalogue {
    /// Builds a catalogue, keeping the first definition of any duplicated id.
    pub fn new(jobs: impl IntoIterator<Item = JobDefinition>) -> Self {
        let mut unique: Vec<JobDefinition> = Vec::new();
        for job in jobs {
            if unique.iter().any(|existing| existing.id == job.id) {
                tracing::warn!(job = job.id, "Duplicate job id in catalogue, ignoring.");
                continue;
            }
            unique.push(job);
        }
        Self { jobs: unique }
    }

    pub fn get(&self, id: &str) -> Option<&JobDefinition> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JobDefinition> {
        self.jobs.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.jobs.iter().map(|job| job.id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Arc<dyn Probe> {
        probe_fn(|_| async { Ok(ProbeReply::Data(Value::Null)) })
    }

    #[test]
    fn duplicate_ids_keep_the_first_definition() {
        let catalogue = Catalogue::new([
            JobDefinition::new("dns", &[AddressKind::Url], noop()),
            JobDefinition::new("dns", &[AddressKind::Ipv4], noop()),
            JobDefinition::new("ports", &[AddressKind::Ipv4], noop()),
        ]);
        assert_eq!(catalogue.len(), 2);
        assert_eq!(catalogue.get("dns").map(|j| j.kinds), Some(&[AddressKind::Url][..]));
        assert_eq!(catalogue.ids().collect::<Vec<_>>(), vec!["dns", "ports"]);
    }

    #[test]
    fn applicability_is_kind_membership() {
        let job = JobDefinition::new("ports", &[AddressKind::Ipv4, AddressKind::Ipv6], noop());
        assert!(job.applies_to(AddressKind::Ipv6));
        assert!(!job.applies_to(AddressKind::Url));
    }

    #[tokio::test]
    async fn closures_can_act_as_probes() {
        let probe = probe_fn(|address: Address| async move {
            ProbeReply::data(&serde_json::json!({ "host": address.host() }))
        });
        let address = Address::parse("https://example.com/a").unwrap();
        let reply = probe.probe(&address).await.unwrap();
        assert_eq!(reply, ProbeReply::Data(serde_json::json!({ "host": "example.com" })));
    }
}
