//! Stage processors: the units of work the executor invokes.
//!
//! The orchestrator only sees the narrow [`StageProcessor`] trait. The
//! production implementation, [`CommandProcessor`], runs the stage's
//! configured command as a child process.

pub mod command;

pub use command::CommandProcessor;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::stage::StageDefinition;

/// Status reported by a stage processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExitSignal {
    Success,
    /// Non-zero exit code
    Code(i32),
    /// Terminated without an exit code (e.g. killed by a signal)
    Killed,
    /// The processor could not be invoked at all
    Error(String),
}

impl ExitSignal {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitSignal::Success)
    }

    /// Map a finished child process status.
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(0) => ExitSignal::Success,
            Some(code) => ExitSignal::Code(code),
            None => ExitSignal::Killed,
        }
    }
}

impl std::fmt::Display for ExitSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitSignal::Success => write!(f, "success"),
            ExitSignal::Code(code) => write!(f, "exit code {}", code),
            ExitSignal::Killed => write!(f, "terminated without exit code"),
            ExitSignal::Error(msg) => write!(f, "could not run: {}", msg),
        }
    }
}

/// Invokes one stage with an optional entity scope.
///
/// Implementations must be idempotent for the same stage and scope: a resumed
/// run may invoke a stage again after a partial failure.
#[async_trait]
pub trait StageProcessor: Send + Sync {
    /// Run `stage` to completion. `Err` means the stage could not be invoked.
    async fn invoke(&self, stage: &StageDefinition, scope: Option<&str>) -> Result<ExitSignal>;
}
