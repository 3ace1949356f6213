// src/core/executor.rs

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::core::catalogue::{JobDefinition, ProbeReply};
use crate::core::error::ProbeError;
use crate::core::models::{Address, Outcome};
use crate::core::timeout::{DEFAULT_REMOTE_TIMEOUT, TIMEOUT_MARKER, race_remote};

/// Aborts the probe task when the waiting side goes away.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs one job's probe and normalizes whatever happens into an [`Outcome`].
///
/// The probe runs in its own task so that a panic is contained. That task is
/// aborted when the remote deadline wins the race, and also when the future
/// returned by [`execute`](Self::execute) is dropped before it resolves.
#[derive(Debug, Clone, Copy)]
pub struct ProbeExecutor {
    remote_timeout: Duration,
}

impl Default for ProbeExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_REMOTE_TIMEOUT)
    }
}

impl ProbeExecutor {
    pub fn new(remote_timeout: Duration) -> Self {
        Self { remote_timeout }
    }

    pub fn remote_timeout(&self) -> Duration {
        self.remote_timeout
    }

    pub async fn execute(&self, job: &JobDefinition, address: &Address) -> Outcome {
        let probe = job.probe.clone();
        let target = address.clone();
        debug!(job = job.id, target = %address.raw(), "Invoking probe.");

        let mut task = AbortOnDrop(tokio::spawn(async move { probe.probe(&target).await }));

        match race_remote(self.remote_timeout, &mut task.0).await {
            Ok(Ok(Ok(ProbeReply::Data(payload)))) => Outcome::Success(payload),
            Ok(Ok(Ok(ProbeReply::Skip(reason)))) => Outcome::skipped(reason),
            Ok(Ok(Err(e))) => {
                let remote_timeout = e.is_remote_timeout();
                debug!(job = job.id, error = %e, remote_timeout, "Probe failed.");
                Outcome::Error { message: error_message(&e, remote_timeout), remote_timeout }
            }
            Ok(Err(join_error)) => {
                error!(job = job.id, error = %join_error, "Probe task panicked!");
                Outcome::error(format!("Probe crashed: {join_error}"))
            }
            Err(timeout) => {
                warn!(job = job.id, after_ms = %timeout.after.as_millis(), "Remote deadline exceeded.");
                Outcome::Error { message: timeout.to_string(), remote_timeout: true }
            }
        }
    }
}

/// Job states keep only the message, so a remote timeout must carry the marker in it.
fn error_message(e: &ProbeError, remote_timeout: bool) -> String {
    let message = e.to_string();
    if remote_timeout && !message.contains(TIMEOUT_MARKER) {
        format!("{TIMEOUT_MARKER}: {message}")
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalogue::probe_fn;
    use crate::core::error::ProbeError;
    use crate::core::models::AddressKind;
    use crate::core::timeout::TIMEOUT_MARKER;
    use serde_json::json;

    fn address() -> Address {
        Address::parse("example.com").unwrap()
    }

    fn job(probe: std::sync::Arc<dyn crate::core::catalogue::Probe>) -> JobDefinition {
        JobDefinition::new("test", &[AddressKind::Url], probe)
    }

    #[tokio::test]
    async fn data_becomes_success() {
        let job = job(probe_fn(|_| async { Ok(ProbeReply::Data(json!({ "ok": true }))) }));
        let outcome = ProbeExecutor::default().execute(&job, &address()).await;
        assert_eq!(outcome, Outcome::Success(json!({ "ok": true })));
    }

    #[tokio::test]
    async fn skip_reply_becomes_skipped() {
        let job = job(probe_fn(|_| async { Ok(ProbeReply::Skip("no robots.txt".into())) }));
        let outcome = ProbeExecutor::default().execute(&job, &address()).await;
        assert_eq!(outcome, Outcome::skipped("no robots.txt"));
    }

    #[tokio::test]
    async fn probe_error_becomes_plain_error() {
        let job = job(probe_fn(|_| async { Err(ProbeError::failed("connection refused")) }));
        let outcome = ProbeExecutor::default().execute(&job, &address()).await;
        assert_eq!(outcome, Outcome::error("connection refused"));
        assert_eq!(outcome.status_code(), 500);
    }

    #[tokio::test]
    async fn panics_are_absorbed() {
        let job = job(probe_fn(|_| async {
            let payload: Option<serde_json::Value> = None;
            Ok(ProbeReply::Data(payload.expect("probe blew up")))
        }));
        let outcome = ProbeExecutor::default().execute(&job, &address()).await;
        match outcome {
            Outcome::Error { message, remote_timeout } => {
                assert!(message.starts_with("Probe crashed"));
                assert!(!remote_timeout);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_produces_tagged_error_and_408() {
        let job = job(probe_fn(|_| async {
            tokio::time::sleep(Duration::from_secs(61)).await;
            Ok(ProbeReply::Data(json!({})))
        }));
        let outcome = ProbeExecutor::new(Duration::from_secs(60)).execute(&job, &address()).await;
        match &outcome {
            Outcome::Error { message, remote_timeout } => {
                assert!(message.contains(TIMEOUT_MARKER));
                assert!(*remote_timeout);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(outcome.status_code(), 408);
    }

    #[tokio::test]
    async fn remote_service_timeouts_are_tagged_too() {
        let job = job(probe_fn(|_| async {
            Err(ProbeError::RemoteTimeout("upstream timed-out".into()))
        }));
        let outcome = ProbeExecutor::default().execute(&job, &address()).await;
        assert_eq!(outcome.status_code(), 408);
    }

    #[tokio::test]
    async fn remote_timeouts_without_the_marker_get_it_prefixed() {
        let job = job(probe_fn(|_| async {
            Err(ProbeError::RemoteTimeout("upstream service gave up".into()))
        }));
        let outcome = ProbeExecutor::default().execute(&job, &address()).await;
        assert_eq!(
            outcome,
            Outcome::Error {
                message: format!("{TIMEOUT_MARKER}: upstream service gave up"),
                remote_timeout: true,
            }
        );
    }

    #[test]
    fn plain_failures_keep_their_message() {
        let e = ProbeError::failed("connection refused");
        assert_eq!(error_message(&e, false), "connection refused");
        let e = ProbeError::failed("gateway timed-out");
        assert_eq!(error_message(&e, true), "gateway timed-out");
    }
}
