//! Typed error hierarchy for the pipeline orchestrator.
//!
//! `PipelineError` covers everything that stops a run before or during stage
//! execution. I/O at the edges (config, state log, audit records) stays on
//! `anyhow` and is wrapped through `PipelineError::Other`.

use thiserror::Error;

use crate::processor::ExitSignal;

/// Errors from the orchestrator: registry construction, configuration and runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unknown resume target '{id}'. Known stages: {}", known.join(", "))]
    UnknownResumeTarget { id: String, known: Vec<String> },

    #[error("Stage {id} ({label}) failed: {exit}")]
    StageFailed {
        id: String,
        label: String,
        exit: ExitSignal,
    },

    #[error("Stage id '{0}' is registered more than once")]
    DuplicateStage(String),

    #[error("Stage at position {0} has an empty id")]
    EmptyStageId(usize),

    #[error("Configuration names unknown stage '{0}'")]
    UnknownStageInConfig(String),

    #[error("Stage {0} has an empty command")]
    EmptyCommand(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// True for errors detected before any stage could run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::UnknownResumeTarget { .. }
                | PipelineError::DuplicateStage(_)
                | PipelineError::EmptyStageId(_)
                | PipelineError::UnknownStageInConfig(_)
                | PipelineError::EmptyCommand(_)
        )
    }
}
