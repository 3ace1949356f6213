// src/core/orchestrator.rs

//! Scan sessions and the fan-out that drives them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::core::catalogue::{Catalogue, JobDefinition};
use crate::core::error::ScanError;
use crate::core::executor::ProbeExecutor;
use crate::core::models::{Address, JobState, Outcome};
use crate::core::report::Report;
use crate::core::store::{JobStateStore, Transition};
use crate::core::timeout::{DEFAULT_REMOTE_TIMEOUT, DEFAULT_WATCHDOG};
use crate::core::watchdog::Watchdog;

/// Shown on every job when the kill switch is on.
pub const DISABLED_MESSAGE: &str = "Web checks are temporarily disabled on this instance. Please try again later.";

/// All state for one submitted address.
///
/// A new address gets a new session; sessions are never reused. Dropping the
/// session cancels every attempt still running under it.
#[derive(Debug)]
pub struct ScanSession {
    id: Uuid,
    address: Address,
    created_at: DateTime<Utc>,
    store: Arc<JobStateStore>,
    watchdog: Watchdog,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl ScanSession {
    fn new<'a>(
        address: Address,
        job_ids: impl IntoIterator<Item = &'a str>,
        watchdog_delay: Duration,
    ) -> Self {
        let store = Arc::new(JobStateStore::seed(job_ids));
        let cancel = CancellationToken::new();
        let watchdog = Watchdog::spawn(watchdog_delay, store.clone(), cancel.clone());
        Self {
            id: Uuid::new_v4(),
            address,
            created_at: Utc::now(),
            store,
            watchdog,
            cancel,
            started: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn store(&self) -> &JobStateStore {
        &self.store
    }

    pub async fn jobs(&self) -> Vec<JobState> {
        self.store.snapshot().await
    }

    pub async fn job(&self, job_id: &str) -> Option<JobState> {
        self.store.get(job_id).await
    }

    /// Computes a fresh report from the current job states.
    pub async fn report(&self) -> Report {
        Report::new(self.address.raw(), self.store.snapshot().await)
    }

    pub async fn wait_settled(&self) {
        self.store.wait_settled().await
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Decides which jobs apply to a session's address and launches them.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    catalogue: Arc<Catalogue>,
    executor: ProbeExecutor,
    watchdog: Duration,
    disabled: bool,
}

impl Orchestrator {
    pub fn new(catalogue: Arc<Catalogue>) -> Self {
        Self {
            catalogue,
            executor: ProbeExecutor::new(DEFAULT_REMOTE_TIMEOUT),
            watchdog: DEFAULT_WATCHDOG,
            disabled: false,
        }
    }

    pub fn with_remote_timeout(mut self, remote_timeout: Duration) -> Self {
        self.executor = ProbeExecutor::new(remote_timeout);
        self
    }

    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn executor(&self) -> ProbeExecutor {
        self.executor
    }

    pub fn watchdog(&self) -> Duration {
        self.watchdog
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Classifies `raw`, creates a session for it and starts every job.
    ///
    /// Must be called within a Tokio runtime.
    pub async fn open(&self, raw: &str) -> Result<Arc<ScanSession>, ScanError> {
        let address = Address::parse(raw)?;
        let session = Arc::new(ScanSession::new(address, self.catalogue.ids(), self.watchdog));
        info!(
            session = %session.id,
            target = %session.address.raw(),
            kind = %session.address.kind(),
            jobs = self.catalogue.len(),
            "Scan session created."
        );
        self.start(&session).await;
        Ok(session)
    }

    /// Skips inapplicable jobs, then launches every other job at once.
    ///
    /// Runs once per session; later calls do nothing. Use [`start_one`](Self::start_one)
    /// to re-run a single finished job.
    pub async fn start(&self, session: &Arc<ScanSession>) {
        if session.started.swap(true, Ordering::SeqCst) {
            debug!(session = %session.id, "Session already started, ignoring.");
            return;
        }
        if self.disabled {
            info!(session = %session.id, "Kill switch on, skipping every job.");
            for job in self.catalogue.iter() {
                settle(session, job.id, 0, Outcome::skipped(DISABLED_MESSAGE)).await;
            }
            return;
        }

        let kind = session.address.kind();
        let started_at = session.store.started_at();
        for job in self.catalogue.iter() {
            if !job.applies_to(kind) {
                debug!(job = job.id, %kind, "Job not applicable, skipping.");
                let reason = format!("'{}' does not apply to {kind} addresses", job.id);
                settle(session, job.id, 0, Outcome::skipped(reason)).await;
                continue;
            }
            self.launch(session, job, 0, started_at);
        }
    }

    /// Starts a fresh attempt of exactly one job, leaving every other job untouched.
    pub async fn start_one(&self, session: &Arc<ScanSession>, job_id: &str) -> Result<u32, ScanError> {
        let job = self
            .catalogue
            .get(job_id)
            .ok_or_else(|| ScanError::UnknownJob(job_id.to_string()))?;

        let attempt = session
            .store
            .update(job.id, Transition::Restart)
            .await
            .ok_or_else(|| ScanError::JobBusy(job_id.to_string()))?;

        let kind = session.address.kind();
        if self.disabled {
            settle(session, job.id, attempt, Outcome::skipped(DISABLED_MESSAGE)).await;
        } else if !job.applies_to(kind) {
            let reason = format!("'{}' does not apply to {kind} addresses", job.id);
            settle(session, job.id, attempt, Outcome::skipped(reason)).await;
        } else {
            let started_at = session
                .store
                .get(job.id)
                .await
                .map(|state| state.started_at)
                .unwrap_or_else(tokio::time::Instant::now);
            self.launch(session, job, attempt, started_at);
        }
        Ok(attempt)
    }

    fn launch(
        &self,
        session: &Arc<ScanSession>,
        job: &JobDefinition,
        attempt: u32,
        started_at: tokio::time::Instant,
    ) {
        let cancel = session.cancel.child_token();
        session.watchdog.arm(job.id, attempt, started_at, cancel.clone());

        let executor = self.executor;
        let job = job.clone();
        let address = session.address.clone();
        let store = session.store.clone();
        let span = info_span!("job", session = %session.id, job = job.id, attempt);

        tokio::spawn(
            async move {
                let outcome = tokio::select! {
                    outcome = executor.execute(&job, &address) => outcome,
                    _ = cancel.cancelled() => {
                        debug!("Attempt cancelled before its probe resolved.");
                        return;
                    }
                };
                store.update(job.id, Transition::Settle { attempt, outcome }).await;
            }
            .instrument(span),
        );
    }
}

async fn settle(session: &ScanSession, job_id: &str, attempt: u32, outcome: Outcome) {
    session
        .store
        .update(job_id, Transition::Settle { attempt, outcome })
        .await;
}
