// src/core/timeout.rs

//! The remote layer of the timeout guard: one probe invocation raced against a deadline.
//!
//! The local layer lives in [`crate::core::watchdog`].

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Marker contained in every remote-deadline message, so callers can tell it apart.
pub const TIMEOUT_MARKER: &str = "timed-out";

/// Default remote-layer deadline.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Default local watchdog delay.
pub const DEFAULT_WATCHDOG: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Request timed-out after {} ms", .after.as_millis())]
pub struct RemoteTimeout {
    pub after: Duration,
}

/// Races `operation` against `deadline`.
///
/// The operation future is dropped when the deadline wins.
pub async fn race_remote<F>(deadline: Duration, operation: F) -> Result<F::Output, RemoteTimeout>
where
    F: Future,
{
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| RemoteTimeout { after: deadline })
}

/// Appended to remote-timeout messages returned over HTTP.
pub fn timeout_hint(deadline: Duration) -> String {
    format!(
        "You can re-trigger this request by retrying the job.\n\
         If you run your own instance, raise the limit with the `API_TIMEOUT_LIMIT` \
         environment variable (milliseconds). The current limit is {} ms.",
        deadline.as_millis()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fast_operation_wins_the_race() {
        let result = race_remote(Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            7
        })
        .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_operation_is_tagged_as_timed_out() {
        let result = race_remote(Duration::from_secs(60), async {
            tokio::time::sleep(Duration::from_secs(61)).await;
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.after, Duration::from_secs(60));
        assert!(err.to_string().contains(TIMEOUT_MARKER));
        assert_eq!(err.to_string(), "Request timed-out after 60000 ms");
    }
}
