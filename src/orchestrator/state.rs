use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;

/// Stage transition recorded in the state log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Started => "started",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(StageStatus::Started),
            "completed" => Some(StageStatus::Completed),
            "failed" => Some(StageStatus::Failed),
            "skipped" => Some(StageStatus::Skipped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    pub stage: String,
    pub status: StageStatus,
    /// Entity filter the stage ran with, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Entity filter of the whole run; set even for stages that ran unfiltered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of stage transitions across runs.
///
/// Format, one entry per line: `stage|status|scope|filter|timestamp`, where
/// `scope` is what the stage received and `filter` is the run's `--party`
/// value. Both are empty when absent and may not contain `|` or line breaks.
pub struct StateManager {
    state_file: std::path::PathBuf,
}

impl StateManager {
    pub fn new(state_file: std::path::PathBuf) -> Self {
        Self { state_file }
    }

    pub fn save(
        &self,
        stage: &str,
        status: StageStatus,
        scope: Option<&str>,
        filter: Option<&str>,
    ) -> Result<()> {
        let entry = format!(
            "{}|{}|{}|{}|{}\n",
            field(stage)?,
            status.as_str(),
            field(scope.unwrap_or(""))?,
            field(filter.unwrap_or(""))?,
            Utc::now().to_rfc3339()
        );

        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.state_file)
            .context("Failed to open state file")?
            .write_all(entry.as_bytes())
            .context("Failed to write state entry")?;

        Ok(())
    }

    pub fn get_entries(&self) -> Result<Vec<StateEntry>> {
        if !self.state_file.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.state_file).context("Failed to read state file")?;

        let entries = content
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split('|').collect();
                let [stage, status, scope, filter, timestamp] = parts.as_slice() else {
                    return None;
                };
                Some(StateEntry {
                    stage: stage.to_string(),
                    status: StageStatus::parse(status)?,
                    scope: non_empty(scope),
                    filter: non_empty(filter),
                    timestamp: DateTime::parse_from_rfc3339(timestamp)
                        .ok()?
                        .with_timezone(&Utc),
                })
            })
            .collect();

        Ok(entries)
    }

    /// The most recent entry with the given status.
    pub fn last_with_status(&self, status: StageStatus) -> Result<Option<StateEntry>> {
        Ok(self
            .get_entries()?
            .into_iter()
            .rev()
            .find(|e| e.status == status))
    }

    pub fn get_last_completed_stage(&self) -> Option<String> {
        self.last_with_status(StageStatus::Completed)
            .ok()
            .flatten()
            .map(|e| e.stage)
    }

    /// The stage to pass to `--from`: the last failure, unless a later entry
    /// shows that stage completed since.
    pub fn suggested_resume_point(&self) -> Result<Option<StateEntry>> {
        let entries = self.get_entries()?;
        let Some(idx) = entries
            .iter()
            .rposition(|e| e.status == StageStatus::Failed)
        else {
            return Ok(None);
        };
        let failed = &entries[idx];
        let recovered = entries[idx + 1..]
            .iter()
            .any(|e| e.stage == failed.stage && e.status == StageStatus::Completed);
        Ok((!recovered).then(|| failed.clone()))
    }

    pub fn reset(&self) -> Result<()> {
        if self.state_file.exists() {
            fs::remove_file(&self.state_file).context("Failed to remove state file")?;
        }
        Ok(())
    }
}

fn field(value: &str) -> Result<&str> {
    anyhow::ensure!(
        !value.contains(['|', '\n', '\r']),
        "State log values may not contain '|' or line breaks: {:?}",
        value
    );
    Ok(value)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
