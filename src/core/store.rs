// src/core/store.rs

//! The single source of truth for job states within one scan session.

use tokio::sync::{RwLock, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::core::models::{JobState, JobStatus, Outcome};

/// A keyed change applied to one job.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Start a fresh attempt: back to Loading with a new elapsed-time baseline.
    Restart,
    /// Finalize the given attempt with its outcome.
    Settle { attempt: u32, outcome: Outcome },
}

/// Job states for one session, seeded once and then mutated only through [`update`].
///
/// Every write touches exactly one job. A settle is applied only while that job is
/// still Loading *and* belongs to its current attempt, so the first finalizing
/// write wins and late results from superseded attempts are dropped.
///
/// [`update`]: JobStateStore::update
#[derive(Debug)]
pub struct JobStateStore {
    jobs: RwLock<Vec<JobState>>,
    version: watch::Sender<u64>,
    started_at: Instant,
}

impl JobStateStore {
    /// Creates one Loading state per id, all sharing the same start instant.
    pub fn seed<'a>(job_ids: impl IntoIterator<Item = &'a str>) -> Self {
        let started_at = Instant::now();
        let jobs = job_ids
            .into_iter()
            .map(|id| JobState::loading(id, started_at))
            .collect();
        let (version, _) = watch::channel(0);
        Self { jobs: RwLock::new(jobs), version, started_at }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Applies `transition` to `job_id`.
    ///
    /// Returns the attempt number the transition applied to, or `None` when it was
    /// discarded (unknown job, restart of a Loading job, stale or duplicate settle).
    pub async fn update(&self, job_id: &str, transition: Transition) -> Option<u32> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.iter_mut().find(|job| job.id == job_id) else {
            warn!(job = job_id, "Update for unknown job ignored.");
            return None;
        };

        let applied = match transition {
            Transition::Restart => restart(job),
            Transition::Settle { attempt, outcome } => settle(job, attempt, outcome),
        };
        drop(jobs);

        if applied.is_some() {
            self.version.send_modify(|version| *version += 1);
        }
        applied
    }

    pub async fn get(&self, job_id: &str) -> Option<JobState> {
        self.jobs.read().await.iter().find(|job| job.id == job_id).cloned()
    }

    /// A consistent copy of every job state, in catalogue order.
    pub async fn snapshot(&self) -> Vec<JobState> {
        self.jobs.read().await.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.jobs.read().await.iter().any(|job| job.status == JobStatus::Loading)
    }

    /// Receives a new value after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Resolves once no job is Loading.
    pub async fn wait_settled(&self) {
        let mut changes = self.version.subscribe();
        while self.is_loading().await {
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}

fn restart(job: &mut JobState) -> Option<u32> {
    if job.status == JobStatus::Loading {
        debug!(job = %job.id, attempt = job.attempt, "Restart refused, attempt still loading.");
        return None;
    }
    job.attempt += 1;
    job.status = JobStatus::Loading;
    job.error = None;
    job.elapsed_ms = None;
    job.result = None;
    job.started_at = Instant::now();
    info!(job = %job.id, attempt = job.attempt, "Job restarted.");
    Some(job.attempt)
}

fn settle(job: &mut JobState, attempt: u32, outcome: Outcome) -> Option<u32> {
    if attempt != job.attempt || job.status != JobStatus::Loading {
        debug!(
            job = %job.id,
            attempt,
            current_attempt = job.attempt,
            status = %job.status,
            "Discarding result of a finalized or superseded attempt."
        );
        return None;
    }

    let elapsed_ms = job.started_at.elapsed().as_millis() as u64;
    job.status = outcome.status();
    job.elapsed_ms = Some(elapsed_ms);
    match outcome {
        Outcome::Success(payload) => {
            job.result = Some(payload);
            info!(job = %job.id, attempt, elapsed_ms, "Job succeeded.");
        }
        Outcome::Skipped { reason } => {
            debug!(job = %job.id, attempt, reason = %reason, "Job skipped.");
            job.error = Some(reason);
        }
        Outcome::Error { message, remote_timeout } => {
            warn!(job = %job.id, attempt, elapsed_ms, remote_timeout, error = %message, "Job failed.");
            job.error = Some(message);
        }
        Outcome::TimedOut { message } => {
            warn!(job = %job.id, attempt, elapsed_ms, "Job timed out.");
            job.error = Some(message);
        }
    }
    Some(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn settle_with(attempt: u32, outcome: Outcome) -> Transition {
        Transition::Settle { attempt, outcome }
    }

    #[tokio::test]
    async fn seeding_creates_one_loading_state_per_job() {
        let store = JobStateStore::seed(["a", "b", "c"]);
        let jobs = store.snapshot().await;
        assert_eq!(jobs.len(), 3);
        assert!(jobs.iter().all(|job| job.status == JobStatus::Loading));
        assert!(jobs.iter().all(|job| job.elapsed_ms.is_none() && job.attempt == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn first_settle_wins() {
        let store = JobStateStore::seed(["a"]);
        tokio::time::advance(Duration::from_millis(200)).await;

        assert_eq!(store.update("a", settle_with(0, Outcome::Success(json!(1)))).await, Some(0));
        assert_eq!(store.update("a", settle_with(0, Outcome::error("late"))).await, None);

        let job = store.get("a").await.unwrap();
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.elapsed_ms, Some(200));
        assert_eq!(job.result, Some(json!(1)));
        assert_eq!(job.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_opens_a_new_attempt_and_drops_stale_results() {
        let store = JobStateStore::seed(["a", "b"]);
        store.update("a", settle_with(0, Outcome::error("boom"))).await;
        store.update("b", settle_with(0, Outcome::Success(json!("b")))).await;
        let before_b = store.get("b").await.unwrap();

        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(store.update("a", Transition::Restart).await, Some(1));
        let restarted = store.get("a").await.unwrap();
        assert_eq!(restarted.status, JobStatus::Loading);
        assert_eq!(restarted.error, None);
        assert_eq!(restarted.elapsed_ms, None);

        assert_eq!(store.update("a", settle_with(0, Outcome::Success(json!("old")))).await, None);
        tokio::time::advance(Duration::from_millis(30)).await;
        assert_eq!(store.update("a", settle_with(1, Outcome::Success(json!("new")))).await, Some(1));

        let job = store.get("a").await.unwrap();
        assert_eq!(job.result, Some(json!("new")));
        assert_eq!(job.elapsed_ms, Some(30));

        let after_b = store.get("b").await.unwrap();
        assert_eq!(after_b.status, before_b.status);
        assert_eq!(after_b.elapsed_ms, before_b.elapsed_ms);
        assert_eq!(after_b.attempt, 0);
    }

    #[tokio::test]
    async fn restart_of_a_loading_job_is_refused() {
        let store = JobStateStore::seed(["a"]);
        assert_eq!(store.update("a", Transition::Restart).await, None);
        assert_eq!(store.get("a").await.unwrap().attempt, 0);
    }

    #[tokio::test]
    async fn unknown_jobs_are_ignored() {
        let store = JobStateStore::seed(["a"]);
        assert_eq!(store.update("zzz", Transition::Restart).await, None);
    }

    #[tokio::test]
    async fn version_moves_only_on_applied_transitions() {
        let store = JobStateStore::seed(["a"]);
        let changes = store.subscribe();
        store.update("a", settle_with(3, Outcome::error("wrong attempt"))).await;
        assert!(!changes.has_changed().unwrap());
        store.update("a", settle_with(0, Outcome::error("boom"))).await;
        assert!(changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn wait_settled_returns_once_nothing_is_loading() {
        let store = std::sync::Arc::new(JobStateStore::seed(["a", "b"]));
        let waiter = tokio::spawn({
            let store = store.clone();
            async move { store.wait_settled().await }
        });
        store.update("a", settle_with(0, Outcome::skipped("n/a"))).await;
        assert!(!waiter.is_finished());
        store.update("b", settle_with(0, Outcome::Success(json!(null)))).await;
        waiter.await.unwrap();
        assert!(!store.is_loading().await);
    }
}
