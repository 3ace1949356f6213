// src/app.rs

use std::sync::Arc;

use ratatui::widgets::TableState;
use tracing::{info, warn};

use crate::core::models::JobState;
use crate::core::orchestrator::{Orchestrator, ScanSession};
use crate::core::report::Report;
use crate::core::retry::retry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// Typing an address.
    Idle,
    /// A session is open and some jobs are still loading.
    Scanning,
    /// Every job of the session reached a terminal status.
    Finished,
}

pub struct App {
    pub should_quit: bool,
    pub state: AppState,
    pub input: String,
    /// Last validation or retry error, shown under the input box.
    pub message: Option<String>,
    pub session: Option<Arc<ScanSession>>,
    pub report: Option<Report>,
    pub table_state: TableState,
    orchestrator: Orchestrator,
}

impl App {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            should_quit: false,
            state: AppState::Idle,
            input: String::new(),
            message: None,
            session: None,
            report: None,
            table_state: TableState::default(),
            orchestrator,
        }
    }

    pub fn jobs(&self) -> &[JobState] {
        self.report.as_ref().map(|r| r.jobs.as_slice()).unwrap_or_default()
    }

    pub fn selected_job(&self) -> Option<&JobState> {
        self.table_state.selected().and_then(|i| self.jobs().get(i))
    }

    /// Opens a new session for the typed address, superseding any previous one.
    pub async fn submit(&mut self) {
        match self.orchestrator.open(&self.input).await {
            Ok(session) => {
                info!(session = %session.id(), target = %session.address().raw(), "Scan started from UI.");
                self.session = Some(session);
                self.message = None;
                self.state = AppState::Scanning;
                self.table_state.select(Some(0));
                self.refresh().await;
            }
            Err(e) => {
                warn!(input = %self.input, error = %e, "Address rejected.");
                self.message = Some(e.to_string());
            }
        }
    }

    /// Pulls a fresh report from the current session.
    pub async fn refresh(&mut self) {
        let Some(session) = &self.session else { return };
        let report = session.report().await;
        self.state = if report.summary.is_done() { AppState::Finished } else { AppState::Scanning };
        self.report = Some(report);
    }

    pub async fn retry_selected(&mut self) {
        let (Some(session), Some(job)) = (self.session.clone(), self.selected_job()) else {
            return;
        };
        if !job.can_retry() {
            return;
        }
        let job_id = job.id.clone();
        match retry(&self.orchestrator, &session, &job_id).await {
            Ok(_) => self.message = None,
            Err(e) => self.message = Some(e.to_string()),
        }
        self.refresh().await;
    }

    pub fn select_next(&mut self) {
        let len = self.jobs().len();
        if len == 0 {
            return;
        }
        let next = self.table_state.selected().map_or(0, |i| (i + 1) % len);
        self.table_state.select(Some(next));
    }

    pub fn select_previous(&mut self) {
        let len = self.jobs().len();
        if len == 0 {
            return;
        }
        let previous = self.table_state.selected().map_or(0, |i| (i + len - 1) % len);
        self.table_state.select(Some(previous));
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Back to the input box. Dropping the session cancels whatever it still runs.
    pub fn reset(&mut self) {
        self.state = AppState::Idle;
        self.input.clear();
        self.message = None;
        self.session = None;
        self.report = None;
        self.table_state = TableState::default();
    }
}
