//! `pipeline.toml`: project-level pipeline configuration.
//!
//! The stage list itself is fixed in code. This file only says *how* each
//! stage is invoked and where.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! workdir = "."
//! scope_flag = "--party"
//! env_file = ".env"
//!
//! [stages.step7]
//! command = ["uv", "run", "python", "scripts/generate_comparisons.py"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::stage::StageRegistry;

pub const CONFIG_FILE_NAME: &str = "pipeline.toml";
pub const DEFAULT_SCOPE_FLAG: &str = "--party";
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Project-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Directory stage commands run in, relative to the project directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
    /// Flag used to pass the entity filter (default: "--party")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_flag: Option<String>,
    /// Env file loaded into every stage's environment (default: ".env")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<PathBuf>,
}

/// Per-stage invocation override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageSection {
    /// Program followed by its arguments
    #[serde(default)]
    pub command: Vec<String>,
}

/// The complete pipeline.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineToml {
    #[serde(default)]
    pub project: ProjectSection,
    /// Command overrides keyed by stage id
    #[serde(default)]
    pub stages: BTreeMap<String, StageSection>,
}

impl PipelineToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse pipeline.toml")
    }

    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize pipeline.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// A config spelling out every default, for `config init`.
    pub fn with_defaults(registry: &StageRegistry) -> Self {
        Self {
            project: ProjectSection {
                workdir: Some(PathBuf::from(".")),
                scope_flag: Some(DEFAULT_SCOPE_FLAG.to_string()),
                env_file: Some(PathBuf::from(DEFAULT_ENV_FILE)),
            },
            stages: registry
                .stages()
                .iter()
                .map(|s| {
                    (
                        s.id.clone(),
                        StageSection {
                            command: s.command.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn scope_flag(&self) -> String {
        self.project
            .scope_flag
            .clone()
            .unwrap_or_else(|| DEFAULT_SCOPE_FLAG.to_string())
    }

    /// Stage command overrides in the shape the registry takes.
    pub fn command_overrides(&self) -> BTreeMap<String, Vec<String>> {
        self.stages
            .iter()
            .map(|(id, section)| (id.clone(), section.command.clone()))
            .collect()
    }

    /// Check the configuration against the registry and return any warnings.
    pub fn validate(&self, registry: &StageRegistry) -> Vec<String> {
        let mut warnings = Vec::new();

        for (id, section) in &self.stages {
            if !registry.contains(id) {
                warnings.push(format!(
                    "Unknown stage '{}' in [stages]. Known stages: {}",
                    id,
                    registry.ids().join(", ")
                ));
            }
            if section.command.is_empty() || section.command[0].trim().is_empty() {
                warnings.push(format!("Stage '{}' has an empty command", id));
            }
        }

        if let Some(flag) = &self.project.scope_flag
            && !flag.starts_with('-')
        {
            warnings.push(format!(
                "scope_flag '{}' does not look like a flag (expected e.g. '--party')",
                flag
            ));
        }

        warnings
    }
}
