use super::AuditRun;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::orchestrator::{RunReport, RunRequest};

/// Writes the in-flight run to `current-run.json` after every change and
/// files it under `runs/` once it ends.
pub struct AuditLogger {
    audit_dir: PathBuf,
    current_run: Option<AuditRun>,
    current_run_file: PathBuf,
}

impl AuditLogger {
    pub fn new(audit_dir: &Path) -> Self {
        Self {
            audit_dir: audit_dir.to_path_buf(),
            current_run: None,
            current_run_file: audit_dir.join("current-run.json"),
        }
    }

    fn runs_dir(&self) -> PathBuf {
        self.audit_dir.join("runs")
    }

    fn active_run(&mut self) -> Result<&mut AuditRun> {
        self.current_run
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No run in progress"))
    }

    pub fn start_run(&mut self, request: RunRequest, project_dir: PathBuf) -> Result<()> {
        self.current_run = Some(AuditRun::new(request, project_dir));
        self.save_current()
    }

    pub fn record_report(&mut self, report: &RunReport) -> Result<()> {
        self.active_run()?.record_report(report);
        self.save_current()
    }

    pub fn record_error(&mut self, error: &str) -> Result<()> {
        self.active_run()?.record_error(error);
        self.save_current()
    }

    /// Close the active run and return the path of its record.
    pub fn finish_run(&mut self) -> Result<PathBuf> {
        let runs_dir = self.runs_dir();
        let run = self.active_run()?;
        run.finish();

        let run_file = runs_dir.join(format!(
            "{}_{}.json",
            run.started_at.format("%Y-%m-%dT%H-%M-%S"),
            &run.run_id.simple().to_string()[..8]
        ));
        fs::create_dir_all(&runs_dir).context("Failed to create runs directory")?;
        write_record(&run_file, run)?;

        if self.current_run_file.exists() {
            fs::remove_file(&self.current_run_file)
                .context("Failed to remove current-run.json after finishing run")?;
        }
        self.current_run = None;
        Ok(run_file)
    }

    pub fn save_current(&self) -> Result<()> {
        let Some(run) = &self.current_run else {
            return Ok(());
        };
        fs::create_dir_all(&self.audit_dir).context("Failed to create audit directory")?;
        write_record(&self.current_run_file, run)
    }

    /// Pick up a run left behind by a killed process. Returns false if there is none.
    pub fn load_current(&mut self) -> Result<bool> {
        if !self.current_run_file.exists() {
            return Ok(false);
        }
        self.current_run = Some(read_record(&self.current_run_file)?);
        Ok(true)
    }

    pub fn current_run(&self) -> Option<&AuditRun> {
        self.current_run.as_ref()
    }

    /// Finished run files, most recent first by file name.
    pub fn list_runs(&self) -> Result<Vec<PathBuf>> {
        let runs_dir = self.runs_dir();
        if !runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&runs_dir).context("Failed to read runs directory")? {
            let path = entry.context("Failed to read runs directory entry")?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                runs.push(path);
            }
        }
        runs.sort_by(|a, b| b.cmp(a));
        Ok(runs)
    }

    pub fn load_run(&self, path: &Path) -> Result<AuditRun> {
        read_record(path)
    }

    /// The finished run that started last, if any.
    pub fn latest_run(&self) -> Result<Option<AuditRun>> {
        let mut latest: Option<AuditRun> = None;
        for path in self.list_runs()? {
            let run = self.load_run(&path)?;
            if latest.as_ref().is_none_or(|l| run.started_at > l.started_at) {
                latest = Some(run);
            }
        }
        Ok(latest)
    }

    /// Delete all finished run records and any interrupted run.
    pub fn clear(&mut self) -> Result<usize> {
        let runs = self.list_runs()?;
        for run in &runs {
            fs::remove_file(run)
                .with_context(|| format!("Failed to remove run file: {}", run.display()))?;
        }
        if self.current_run_file.exists() {
            fs::remove_file(&self.current_run_file).context("Failed to remove current-run.json")?;
        }
        self.current_run = None;
        Ok(runs.len())
    }
}

fn write_record(path: &Path, run: &AuditRun) -> Result<()> {
    let json = serde_json::to_string_pretty(run).context("Failed to serialize audit run")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write audit run file: {}", path.display()))
}

fn read_record(path: &Path) -> Result<AuditRun> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read audit run file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse audit run file: {}", path.display()))
}
