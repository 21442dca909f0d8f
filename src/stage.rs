//! Stage definitions and the fixed pipeline registry.
//!
//! This module provides:
//! - `StageDefinition`, one unit of work in the pipeline
//! - `ScopePolicy`, how a stage reacts to a party filter
//! - `StageRegistry`, the validated, ordered stage list
//! - `StageRegistry::standard()`, the election-data pipeline itself

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::errors::PipelineError;

/// Stages whose standard script reads no entity argument.
const DEFAULT_COMMANDS_WITHOUT_SCOPE: [&str; 2] = ["step8", "step11"];

/// How a stage treats the entity filter of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScopePolicy {
    /// Honours the filter and receives it as an argument.
    PerEntity,
    /// Works across all entities; skipped whenever a filter is active.
    CrossEntity,
    /// Never receives the filter and always runs over the whole dataset.
    Unscoped,
}

impl std::fmt::Display for ScopePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopePolicy::PerEntity => write!(f, "per-entity"),
            ScopePolicy::CrossEntity => write!(f, "cross-entity"),
            ScopePolicy::Unscoped => write!(f, "unscoped"),
        }
    }
}

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Short unique token, e.g. "step5"
    pub id: String,
    /// Human-readable description
    pub label: String,
    /// Scope behaviour under a filtered run
    pub scope: ScopePolicy,
    /// Program and arguments that implement this stage
    pub command: Vec<String>,
}

impl StageDefinition {
    pub fn new(id: &str, label: &str, scope: ScopePolicy, command: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            scope,
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether this stage accepts and honours an entity filter.
    #[inline]
    pub fn scope_applicable(&self) -> bool {
        self.scope == ScopePolicy::PerEntity
    }
}

/// The ordered stage list. Order is registry position and never changes.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Vec<StageDefinition>,
}

impl StageRegistry {
    /// Build a registry, rejecting empty or duplicate ids.
    pub fn new(stages: Vec<StageDefinition>) -> Result<Self, PipelineError> {
        let mut seen = HashSet::new();
        for (idx, stage) in stages.iter().enumerate() {
            if stage.id.trim().is_empty() {
                return Err(PipelineError::EmptyStageId(idx + 1));
            }
            if !seen.insert(stage.id.as_str()) {
                return Err(PipelineError::DuplicateStage(stage.id.clone()));
            }
        }
        Ok(Self { stages })
    }

    /// The election-data pipeline.
    pub fn standard() -> Self {
        Self {
            stages: standard_stages(),
        }
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn get(&self, id: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Zero-based registry position of a stage.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Replace stage commands by id. Ids and order are untouched.
    pub fn with_commands(
        mut self,
        overrides: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, PipelineError> {
        for (id, command) in overrides {
            let stage = self
                .stages
                .iter_mut()
                .find(|s| &s.id == id)
                .ok_or_else(|| PipelineError::UnknownStageInConfig(id.clone()))?;
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(PipelineError::EmptyCommand(id.clone()));
            }
            stage.command = command.clone();
        }
        Ok(self)
    }

    /// Per-entity stages still on a standard command that ignores the scope flag.
    pub fn scope_flag_ignored(&self) -> Vec<&StageDefinition> {
        let standard = standard_stages();
        self.stages
            .iter()
            .filter(|s| {
                s.scope_applicable() && DEFAULT_COMMANDS_WITHOUT_SCOPE.contains(&s.id.as_str())
            })
            .filter(|s| standard.iter().any(|d| d.id == s.id && d.command == s.command))
            .collect()
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_stages() -> Vec<StageDefinition> {
    use ScopePolicy::{CrossEntity, PerEntity, Unscoped};

    vec![
        StageDefinition::new(
            "step1",
            "ingest YAML+documents",
            PerEntity,
            &["uv", "run", "python", "scripts/ingest.py"],
        ),
        StageDefinition::new(
            "step2",
            "discover social-handle candidates (write-back to config)",
            PerEntity,
            &["uv", "run", "python", "scripts/hydrate_bluesky_handles.py"],
        ),
        StageDefinition::new(
            "step3",
            "discover professional-profile-URL candidates (write-back to config)",
            PerEntity,
            &["uv", "run", "python", "scripts/hydrate_linkedin_urls.py"],
        ),
        StageDefinition::new(
            "step4",
            "re-ingest config (apply hydrated fields)",
            PerEntity,
            &["uv", "run", "python", "scripts/ingest.py"],
        ),
        StageDefinition::new(
            "step5",
            "generate embeddings for document chunks",
            PerEntity,
            &["uv", "run", "python", "scripts/generate_embeddings.py"],
        ),
        StageDefinition::new(
            "step6",
            "generate per-entity AI summaries",
            PerEntity,
            &["uv", "run", "python", "scripts/generate_summaries.py"],
        ),
        StageDefinition::new(
            "step7",
            "generate cross-entity AI topic comparisons",
            CrossEntity,
            &["uv", "run", "python", "scripts/generate_comparisons.py"],
        ),
        StageDefinition::new(
            "step8",
            "fetch social posts + AI summaries",
            PerEntity,
            &["uv", "run", "python", "scripts/fetch_social.py"],
        ),
        StageDefinition::new(
            "step9",
            "fetch professional-network posts",
            PerEntity,
            &["uv", "run", "python", "scripts/fetch_linkedin.py"],
        ),
        StageDefinition::new(
            "step10",
            "fetch external council-record feed (always unfiltered)",
            Unscoped,
            &["uv", "run", "python", "scripts/fetch_motions.py"],
        ),
        StageDefinition::new(
            "step11",
            "generate AI summaries of council records per entity",
            PerEntity,
            &["uv", "run", "python", "scripts/generate_motion_summaries.py"],
        ),
    ]
}
