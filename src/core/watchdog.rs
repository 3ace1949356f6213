// src/core/watchdog.rs

//! The local layer of the timeout guard.
//!
//! One timer task per scan session. Every attempt is armed with a deadline when
//! it starts; the initial fan-out arms every eligible job with the same instant,
//! so together they behave as a single session-wide timer. When a deadline
//! passes and the attempt is still Loading, the job is forced to TimedOut and the
//! attempt's cancellation token fires.

use std::future::poll_fn;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::time::DelayQueue;
use tracing::{debug, info};

use crate::core::models::Outcome;
use crate::core::store::{JobStateStore, Transition};

#[derive(Debug)]
struct Armed {
    job_id: String,
    attempt: u32,
    cancel: CancellationToken,
}

/// Handle used to arm deadlines on a session's watchdog task.
#[derive(Debug, Clone)]
pub struct Watchdog {
    delay: Duration,
    tx: mpsc::UnboundedSender<(Armed, Instant)>,
}

impl Watchdog {
    /// Spawns the timer task. It stops when `shutdown` is cancelled.
    pub fn spawn(delay: Duration, store: Arc<JobStateStore>, shutdown: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(delay, store, rx, shutdown));
        Self { delay, tx }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms `attempt` of `job_id` to expire at `started_at + delay`.
    pub fn arm(&self, job_id: &str, attempt: u32, started_at: Instant, cancel: CancellationToken) {
        let armed = Armed { job_id: job_id.to_string(), attempt, cancel };
        if self.tx.send((armed, started_at + self.delay)).is_err() {
            debug!(job = job_id, "Watchdog already stopped, deadline not armed.");
        }
    }
}

/// Message stored on a job the watchdog finalized.
pub fn watchdog_message(delay: Duration) -> String {
    format!(
        "No result: exceeded the local watchdog limit of {} ms",
        delay.as_millis()
    )
}

async fn run(
    delay: Duration,
    store: Arc<JobStateStore>,
    mut rx: mpsc::UnboundedReceiver<(Armed, Instant)>,
    shutdown: CancellationToken,
) {
    let mut deadlines: DelayQueue<Armed> = DelayQueue::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some((armed, deadline)) = rx.recv() => {
                deadlines.insert_at(armed, deadline);
            }
            Some(expired) = poll_fn(|cx| deadlines.poll_expired(cx)), if !deadlines.is_empty() => {
                let armed = expired.into_inner();
                let outcome = Outcome::TimedOut { message: watchdog_message(delay) };
                let transition = Transition::Settle { attempt: armed.attempt, outcome };
                if store.update(&armed.job_id, transition).await.is_some() {
                    info!(job = %armed.job_id, attempt = armed.attempt, "Watchdog fired, job forced to timed-out.");
                    armed.cancel.cancel();
                }
            }
            else => break,
        }
    }
    debug!("Watchdog stopped.");
}
