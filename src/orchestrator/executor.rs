//! The pipeline execution loop.
//!
//! For every registered stage, in order: consult the resume cursor, then the
//! scope resolver, then invoke the processor. The first failure aborts the run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::cursor::ResumeCursor;
use super::scope::{RunMode, SkipReason, resolve_scope};
use crate::errors::PipelineError;
use crate::processor::{ExitSignal, StageProcessor};
use crate::stage::{StageDefinition, StageRegistry};

/// What the operator asked for. Built once from CLI flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Stage id to start at; earlier stages are skipped
    pub resume_from: Option<String>,
    /// Entity (party abbreviation) to restrict per-entity stages to
    pub scope_filter: Option<String>,
}

impl RunRequest {
    pub fn new(resume_from: Option<String>, scope_filter: Option<String>) -> Self {
        Self {
            resume_from,
            scope_filter,
        }
    }
}

/// Result of one stage within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage_id: String,
    pub label: String,
    pub executed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitSignal>,
    /// Scope argument passed to the processor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl StageOutcome {
    pub fn skipped(stage: &StageDefinition, reason: SkipReason) -> Self {
        Self {
            stage_id: stage.id.clone(),
            label: stage.label.clone(),
            executed: false,
            skip_reason: Some(reason),
            failed: false,
            exit: None,
            scope: None,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn executed(
        stage: &StageDefinition,
        scope: Option<&str>,
        exit: ExitSignal,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stage_id: stage.id.clone(),
            label: stage.label.clone(),
            executed: true,
            skip_reason: None,
            failed: !exit.is_success(),
            exit: Some(exit),
            scope: scope.map(str::to_string),
            started_at: Some(started_at),
            ended_at: Some(Utc::now()),
        }
    }
}

/// Run lifecycle: `NotStarted -> {Skipping | Running} -> Completed | Aborted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    /// Waiting for the resume target
    Skipping,
    Running,
    Completed,
    Aborted { stage_id: String },
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcomes: Vec<StageOutcome>,
    pub state: RunState,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn executed_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.executed)
            .map(|o| o.stage_id.as_str())
            .collect()
    }

    pub fn failed_stage(&self) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.failed)
    }

    pub fn outcome(&self, stage_id: &str) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.stage_id == stage_id)
    }
}

/// Receives stage lifecycle events while a run is in progress.
pub trait ExecutionObserver {
    /// Called right before the processor is invoked.
    fn stage_started(&self, _stage: &StageDefinition, _scope: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn stage_skipped(&self, _stage: &StageDefinition, _reason: SkipReason) -> Result<()> {
        Ok(())
    }

    fn stage_finished(&self, _stage: &StageDefinition, _outcome: &StageOutcome) -> Result<()> {
        Ok(())
    }
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}

/// Runs the registry's stages in order against a processor.
pub struct PipelineExecutor<P> {
    registry: StageRegistry,
    processor: P,
}

impl<P: StageProcessor> PipelineExecutor<P> {
    pub fn new(registry: StageRegistry, processor: P) -> Self {
        Self {
            registry,
            processor,
        }
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Reject requests that could never execute anything.
    pub fn validate(&self, request: &RunRequest) -> Result<(), PipelineError> {
        if let Some(target) = request.resume_from.as_deref()
            && !self.registry.contains(target)
        {
            return Err(PipelineError::UnknownResumeTarget {
                id: target.to_string(),
                known: self.registry.ids(),
            });
        }
        Ok(())
    }

    /// Decide each stage's run mode without invoking anything.
    pub fn plan(
        &self,
        request: &RunRequest,
    ) -> Result<Vec<(&StageDefinition, RunMode)>, PipelineError> {
        self.validate(request)?;
        let mut cursor = ResumeCursor::new(request.resume_from.as_deref());
        Ok(self
            .registry
            .stages()
            .iter()
            .map(|stage| (stage, decide(stage, &mut cursor, request)))
            .collect())
    }

    /// Run the pipeline. Stage failure is reported through `RunState::Aborted`;
    /// `Err` is reserved for requests that cannot run and observer failures.
    pub async fn execute(
        &self,
        request: &RunRequest,
        observer: &dyn ExecutionObserver,
    ) -> Result<RunReport, PipelineError> {
        self.validate(request)?;

        let mut cursor = ResumeCursor::new(request.resume_from.as_deref());
        let mut state = RunState::NotStarted;
        let mut outcomes = Vec::with_capacity(self.registry.len());

        info!(
            resume_from = ?request.resume_from,
            scope = ?request.scope_filter,
            stages = self.registry.len(),
            "starting pipeline run"
        );

        for stage in self.registry.stages() {
            let mode = decide(stage, &mut cursor, request);
            let next = if cursor.is_armed() {
                RunState::Skipping
            } else {
                RunState::Running
            };
            if next != state {
                debug!(from = ?state, to = ?next, stage = %stage.id, "run state change");
                state = next;
            }

            let scope = match mode {
                RunMode::Skip(reason) => {
                    if reason == SkipReason::NotScopeApplicable {
                        info!(
                            stage = %stage.id,
                            scope = ?request.scope_filter,
                            "cross-entity stage skipped for filtered run"
                        );
                    }
                    observer.stage_skipped(stage, reason)?;
                    outcomes.push(StageOutcome::skipped(stage, reason));
                    continue;
                }
                RunMode::Filtered(scope) => Some(scope),
                RunMode::Unfiltered => None,
            };

            observer.stage_started(stage, scope.as_deref())?;
            info!(stage = %stage.id, scope = ?scope, "running stage");

            let started_at = Utc::now();
            let exit = match self.processor.invoke(stage, scope.as_deref()).await {
                Ok(exit) => exit,
                Err(e) => {
                    warn!(stage = %stage.id, error = %e, "stage could not be invoked");
                    ExitSignal::Error(format!("{:#}", e))
                }
            };

            let outcome = StageOutcome::executed(stage, scope.as_deref(), exit, started_at);
            observer.stage_finished(stage, &outcome)?;
            let failed = outcome.failed;
            outcomes.push(outcome);

            if failed {
                error!(stage = %stage.id, "stage failed, aborting run");
                return Ok(RunReport {
                    outcomes,
                    state: RunState::Aborted {
                        stage_id: stage.id.clone(),
                    },
                });
            }
        }

        if let Some(target) = cursor.target()
            && cursor.is_armed()
        {
            return Err(PipelineError::UnknownResumeTarget {
                id: target.to_string(),
                known: self.registry.ids(),
            });
        }

        info!(
            executed = outcomes.iter().filter(|o| o.executed).count(),
            "pipeline run complete"
        );

        Ok(RunReport {
            outcomes,
            state: RunState::Completed,
        })
    }
}

/// Resume gating first, so a stage before the resume point always reports
/// `BeforeResumePoint` even when it would also be scope-skipped.
fn decide(stage: &StageDefinition, cursor: &mut ResumeCursor, request: &RunRequest) -> RunMode {
    if !cursor.admit(&stage.id) {
        return RunMode::Skip(SkipReason::BeforeResumePoint);
    }
    resolve_scope(stage, request.scope_filter.as_deref())
}
