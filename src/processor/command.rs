//! Child-process stage execution.
//!
//! Each stage command is spawned directly (no shell), with the project's
//! working directory, the env-file variables, and two pipeline variables:
//! `PIPELINE_STAGE` always, `PIPELINE_SCOPE` when the stage runs filtered.
//! Output is inherited so long-running stages stream to the terminal.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{ExitSignal, StageProcessor};
use crate::stage::StageDefinition;

/// Runs stage commands as child processes.
pub struct CommandProcessor {
    /// Working directory for every stage
    workdir: PathBuf,
    /// Flag placed before the scope value, e.g. `--party`
    scope_flag: String,
    /// Extra environment for the child (from the env file)
    env: Vec<(String, String)>,
    /// Capture output instead of inheriting it
    quiet: bool,
}

impl CommandProcessor {
    pub fn new(workdir: impl AsRef<Path>, scope_flag: impl Into<String>) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
            scope_flag: scope_flag.into(),
            env: Vec::new(),
            quiet: false,
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Discard child output. Used by tests.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Arguments passed after the program name.
    pub fn arguments(&self, stage: &StageDefinition, scope: Option<&str>) -> Vec<String> {
        let mut args: Vec<String> = stage.command.iter().skip(1).cloned().collect();
        if let Some(scope) = scope {
            args.push(self.scope_flag.clone());
            args.push(scope.to_string());
        }
        args
    }
}

#[async_trait]
impl StageProcessor for CommandProcessor {
    async fn invoke(&self, stage: &StageDefinition, scope: Option<&str>) -> Result<ExitSignal> {
        let program = stage
            .command
            .first()
            .ok_or_else(|| anyhow::anyhow!("Stage {} has no command", stage.id))?;
        let args = self.arguments(stage, scope);

        debug!(
            stage = %stage.id,
            program = %program,
            args = ?args,
            workdir = %self.workdir.display(),
            "spawning stage command"
        );

        let mut command = Command::new(program);
        command
            .args(&args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env("PIPELINE_STAGE", &stage.id)
            .env_remove("PIPELINE_SCOPE");
        if let Some(scope) = scope {
            command.env("PIPELINE_SCOPE", scope);
        }
        if self.quiet {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let status = command
            .status()
            .await
            .with_context(|| format!("Failed to spawn stage command: {}", program))?;

        debug!(stage = %stage.id, code = ?status.code(), "stage command finished");

        Ok(ExitSignal::from_status(status))
    }
}
