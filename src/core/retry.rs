// src/core/retry.rs

use std::sync::Arc;

use tracing::info;

use crate::core::error::ScanError;
use crate::core::orchestrator::{Orchestrator, ScanSession};

/// Re-runs one finished job of `session` as a fresh attempt.
///
/// Unknown ids and jobs still loading are rejected; every other job in the
/// session keeps its state. Returns the new attempt number.
pub async fn retry(
    orchestrator: &Orchestrator,
    session: &Arc<ScanSession>,
    job_id: &str,
) -> Result<u32, ScanError> {
    let Some(state) = session.job(job_id).await else {
        return Err(ScanError::UnknownJob(job_id.to_string()));
    };
    if !state.status.is_terminal() {
        return Err(ScanError::JobBusy(job_id.to_string()));
    }

    let attempt = orchestrator.start_one(session, job_id).await?;
    info!(session = %session.id(), job = job_id, attempt, previous = %state.status, "Retry requested.");
    Ok(attempt)
}
