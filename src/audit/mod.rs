//! Per-run audit records.
//!
//! Every run writes `.pipeline/current-run.json` when it starts and moves the
//! completed record to `.pipeline/runs/<timestamp>_<id>.json` when it ends.
//! A leftover `current-run.json` means a run was interrupted.

pub mod logger;

pub use logger::AuditLogger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::orchestrator::{RunReport, RunRequest, RunState, StageOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub project_dir: PathBuf,
    pub request: RunRequest,
    #[serde(default)]
    pub outcomes: Vec<StageOutcome>,
    /// Terminal state, absent while running or when the run errored out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RunState>,
    /// Error that stopped the run before or between stages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRun {
    pub fn new(request: RunRequest, project_dir: PathBuf) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ended_at: None,
            project_dir,
            request,
            outcomes: Vec::new(),
            state: None,
            error: None,
        }
    }

    pub fn record_report(&mut self, report: &RunReport) {
        self.outcomes = report.outcomes.clone();
        self.state = Some(report.state.clone());
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.state == Some(RunState::Completed)
    }
}
