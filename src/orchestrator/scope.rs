//! Per-stage scope resolution for filtered runs.

use serde::{Deserialize, Serialize};

use crate::stage::{ScopePolicy, StageDefinition};

/// Why a stage did not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    BeforeResumePoint,
    NotScopeApplicable,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::BeforeResumePoint => write!(f, "before resume point"),
            SkipReason::NotScopeApplicable => write!(f, "not scope-applicable"),
        }
    }
}

/// How a stage runs in this pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Unfiltered,
    Filtered(String),
    Skip(SkipReason),
}

/// Decide how `stage` runs given the run's optional entity filter.
///
/// Independent of resume state; the executor consults the resume cursor first.
pub fn resolve_scope(stage: &StageDefinition, scope_filter: Option<&str>) -> RunMode {
    let Some(filter) = scope_filter else {
        return RunMode::Unfiltered;
    };
    match stage.scope {
        ScopePolicy::PerEntity => RunMode::Filtered(filter.to_string()),
        ScopePolicy::CrossEntity => RunMode::Skip(SkipReason::NotScopeApplicable),
        ScopePolicy::Unscoped => RunMode::Unfiltered,
    }
}
