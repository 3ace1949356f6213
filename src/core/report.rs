// src/core/report.rs

//! Progress statistics derived on demand from a set of job states.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use strum::IntoEnumIterator;

use crate::core::models::{JobState, JobStatus};

/// Number of jobs in each status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub loading: usize,
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
    pub timed_out: usize,
}

impl StatusCounts {
    pub fn from_jobs(jobs: &[JobState]) -> Self {
        jobs.iter().fold(Self::default(), |mut counts, job| {
            *counts.slot(job.status) += 1;
            counts
        })
    }

    pub fn get(&self, status: JobStatus) -> usize {
        match status {
            JobStatus::Loading => self.loading,
            JobStatus::Success => self.success,
            JobStatus::Error => self.error,
            JobStatus::Skipped => self.skipped,
            JobStatus::TimedOut => self.timed_out,
        }
    }

    pub fn total(&self) -> usize {
        self.loading + self.success + self.error + self.skipped + self.timed_out
    }

    fn slot(&mut self, status: JobStatus) -> &mut usize {
        match status {
            JobStatus::Loading => &mut self.loading,
            JobStatus::Success => &mut self.success,
            JobStatus::Error => &mut self.error,
            JobStatus::Skipped => &mut self.skipped,
            JobStatus::TimedOut => &mut self.timed_out,
        }
    }
}

/// Share of jobs in each status, in percent. All five statuses are always present.
pub fn percentages(jobs: &[JobState]) -> BTreeMap<JobStatus, f64> {
    let counts = StatusCounts::from_jobs(jobs);
    let total = counts.total();
    JobStatus::iter()
        .map(|status| {
            let share = if total == 0 {
                0.0
            } else {
                counts.get(status) as f64 / total as f64 * 100.0
            };
            (status, share)
        })
        .collect()
}

/// Human-facing classification of a session's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Summary {
    InProgress { completed: usize, total: usize, skipped: usize },
    AllSucceeded { succeeded: usize, skipped: usize },
    Mixed { succeeded: usize, skipped: usize, failed: usize, timed_out: usize },
}

impl Summary {
    /// Rules, first match wins: anything still loading, then no failures at all,
    /// then a mixed breakdown. Timed-out jobs count as failures.
    pub fn from_jobs(jobs: &[JobState]) -> Self {
        let counts = StatusCounts::from_jobs(jobs);
        let total = counts.total();
        if counts.loading > 0 {
            Summary::InProgress {
                completed: total - counts.loading,
                total,
                skipped: counts.skipped,
            }
        } else if counts.error == 0 && counts.timed_out == 0 {
            Summary::AllSucceeded { succeeded: counts.success, skipped: counts.skipped }
        } else {
            Summary::Mixed {
                succeeded: counts.success,
                skipped: counts.skipped,
                failed: counts.error,
                timed_out: counts.timed_out,
            }
        }
    }

    pub fn is_done(&self) -> bool {
        !matches!(self, Summary::InProgress { .. })
    }
}

fn jobs(count: usize) -> String {
    format!("{count} {}", if count == 1 { "job" } else { "jobs" })
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Summary::InProgress { completed, total, skipped } => {
                write!(f, "Loading {completed} / {total} jobs")?;
                if skipped > 0 {
                    write!(f, " ({} skipped)", jobs(skipped))?;
                }
                Ok(())
            }
            Summary::AllSucceeded { succeeded, skipped } => {
                write!(f, "{} completed successfully", jobs(succeeded))?;
                if skipped > 0 {
                    write!(f, ", {} skipped", jobs(skipped))?;
                }
                Ok(())
            }
            Summary::Mixed { succeeded, skipped, failed, timed_out } => {
                let parts: Vec<String> = [
                    (succeeded, "successful"),
                    (skipped, "skipped"),
                    (failed, "failed"),
                    (timed_out, "timed out"),
                ]
                .into_iter()
                .filter(|(count, _)| *count > 0)
                .map(|(count, label)| format!("{} {label}", jobs(count)))
                .collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

/// Everything a caller needs to render a session's progress at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub address: String,
    pub jobs: Vec<JobState>,
    pub counts: StatusCounts,
    pub percentages: BTreeMap<JobStatus, f64>,
    pub summary: Summary,
    pub summary_text: String,
}

impl Report {
    pub fn new(address: impl Into<String>, jobs: Vec<JobState>) -> Self {
        let summary = Summary::from_jobs(&jobs);
        Self {
            address: address.into(),
            counts: StatusCounts::from_jobs(&jobs),
            percentages: percentages(&jobs),
            summary_text: summary.to_string(),
            summary,
            jobs,
        }
    }
}
