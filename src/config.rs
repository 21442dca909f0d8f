use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::errors::PipelineError;
use crate::pipeline_config::{CONFIG_FILE_NAME, DEFAULT_ENV_FILE, PipelineToml};
use crate::stage::StageRegistry;

/// Runtime configuration for a pipeline invocation.
///
/// Layers `pipeline.toml` (or `--config` / `PIPELINE_CONFIG`), then the
/// `PIPELINE_WORKDIR` environment variable, then CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub config_file: PathBuf,
    pub state_dir: PathBuf,
    pub state_file: PathBuf,
    pub runs_dir: PathBuf,
    /// Where stage commands run
    pub workdir: PathBuf,
    pub scope_flag: String,
    pub env_file: PathBuf,
    pub verbose: bool,
    toml: PipelineToml,
}

impl Config {
    pub fn new(project_dir: PathBuf, config_file: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;

        let config_file = config_file
            .or_else(|| std::env::var("PIPELINE_CONFIG").ok().map(PathBuf::from))
            .map(|p| resolve(&project_dir, &p))
            .unwrap_or_else(|| project_dir.join(CONFIG_FILE_NAME));
        let toml = PipelineToml::load_or_default(&config_file)?;

        let workdir = std::env::var("PIPELINE_WORKDIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| toml.project.workdir.clone())
            .map(|p| resolve(&project_dir, &p))
            .unwrap_or_else(|| project_dir.clone());

        let env_file = resolve(
            &project_dir,
            toml.project
                .env_file
                .as_deref()
                .unwrap_or(Path::new(DEFAULT_ENV_FILE)),
        );

        let state_dir = project_dir.join(".pipeline");
        let state_file = state_dir.join("state");
        let runs_dir = state_dir.join("runs");

        Ok(Self {
            project_dir,
            config_file,
            state_dir,
            state_file,
            runs_dir,
            workdir,
            scope_flag: toml.scope_flag(),
            env_file,
            verbose,
            toml,
        })
    }

    pub fn toml(&self) -> &PipelineToml {
        &self.toml
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.runs_dir).context("Failed to create runs directory")?;
        Ok(())
    }

    /// The standard registry with configured command overrides applied.
    pub fn registry(&self) -> Result<StageRegistry, PipelineError> {
        StageRegistry::standard().with_commands(&self.toml.command_overrides())
    }

    /// Variables from the env file, or nothing if it doesn't exist.
    pub fn child_env(&self) -> Result<Vec<(String, String)>> {
        if !self.env_file.exists() {
            return Ok(Vec::new());
        }
        let iter = dotenvy::from_path_iter(&self.env_file)
            .with_context(|| format!("Failed to open env file: {}", self.env_file.display()))?;
        iter.map(|item| {
            item.with_context(|| format!("Failed to parse env file: {}", self.env_file.display()))
        })
        .collect()
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_config_defaults_without_file() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), None, false).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.config_file, root.join("pipeline.toml"));
        assert_eq!(config.state_file, root.join(".pipeline/state"));
        assert_eq!(config.runs_dir, root.join(".pipeline/runs"));
        assert_eq!(config.env_file, root.join(".env"));
        assert_eq!(config.scope_flag, "--party");
        assert_eq!(config.registry().unwrap().len(), 11);
    }

    #[test]
    fn test_config_reads_project_section() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("backend")).unwrap();
        fs::write(
            dir.path().join("pipeline.toml"),
            "[project]\nworkdir = \"backend\"\nscope_flag = \"--partij\"\n",
        )
        .unwrap();
        let config = Config::new(dir.path().to_path_buf(), None, true).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.workdir, root.join("backend"));
        assert_eq!(config.scope_flag, "--partij");
        assert!(config.verbose);
    }

    #[test]
    fn test_config_explicit_file_and_overrides() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("ci.toml"),
            "[stages.step1]\ncommand = [\"sh\", \"-c\", \"exit 0\"]\n",
        )
        .unwrap();
        let config = Config::new(
            dir.path().to_path_buf(),
            Some(PathBuf::from("ci.toml")),
            false,
        )
        .unwrap();
        let registry = config.registry().unwrap();
        assert_eq!(registry.get("step1").unwrap().command[0], "sh");
    }

    #[test]
    fn test_config_unknown_stage_is_registry_error() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("pipeline.toml"),
            "[stages.step0]\ncommand = [\"true\"]\n",
        )
        .unwrap();
        let config = Config::new(dir.path().to_path_buf(), None, false).unwrap();
        assert!(matches!(
            config.registry(),
            Err(PipelineError::UnknownStageInConfig(_))
        ));
    }

    #[test]
    fn test_child_env_reads_env_file() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(".env"),
            "DATABASE_URL=postgresql://localhost/gemeenteraad\nANTHROPIC_API_KEY=test-key\n",
        )
        .unwrap();
        let config = Config::new(dir.path().to_path_buf(), None, false).unwrap();
        let env = config.child_env().unwrap();
        assert!(env.contains(&(
            "DATABASE_URL".to_string(),
            "postgresql://localhost/gemeenteraad".to_string()
        )));
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn test_child_env_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), None, false).unwrap();
        assert!(config.child_env().unwrap().is_empty());
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), None, false).unwrap();
        config.ensure_directories().unwrap();
        assert!(config.runs_dir.exists());
    }
}
