//! Configuration view and validation commands: `civic-pipeline config`.

use anyhow::Result;

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(
    cli: &Cli,
    project_dir: &std::path::Path,
    command: Option<ConfigCommands>,
) -> Result<()> {
    use civic_pipeline::config::Config;
    use civic_pipeline::pipeline_config::PipelineToml;
    use civic_pipeline::stage::StageRegistry;

    let config = Config::new(project_dir.to_path_buf(), cli.config.clone(), cli.verbose)?;
    let config_path = &config.config_file;

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Pipeline Configuration");
            println!("======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No pipeline.toml found at {}", config_path.display());
                println!("Using built-in defaults.");
            }
            println!();

            println!("[project]");
            println!("  workdir = \"{}\"", config.workdir.display());
            println!("  scope_flag = \"{}\"", config.scope_flag);
            let env_note = if config.env_file.exists() {
                ""
            } else {
                " (not found)"
            };
            println!("  env_file = \"{}\"{}", config.env_file.display(), env_note);
            println!();

            let overrides = config.toml().command_overrides();
            let registry = config.registry()?;
            println!("[stages]");
            for stage in registry.stages() {
                let marker = if overrides.contains_key(&stage.id) {
                    " (configured)"
                } else {
                    ""
                };
                println!("  {} = {:?}{}", stage.id, stage.command, marker);
            }
            println!();

            if !config_path.exists() {
                println!("Run 'civic-pipeline config init' to create a pipeline.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No pipeline.toml found. Using defaults (valid).");
                print_scope_flag_note(&config.registry()?);
                return Ok(());
            }

            let warnings = config.toml().validate(&StageRegistry::standard());
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
            if let Ok(registry) = config.registry() {
                print_scope_flag_note(&registry);
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("pipeline.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            let toml = PipelineToml::with_defaults(&StageRegistry::standard());
            toml.save(config_path)?;

            println!("Created pipeline.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [project] workdir, scope_flag, env_file");
            println!("  - [stages.stepN] command for any stage");
            print_scope_flag_note(&StageRegistry::standard());
            println!();
        }
    }

    Ok(())
}

/// Per-entity stages whose command will silently process every party.
fn print_scope_flag_note(registry: &civic_pipeline::stage::StageRegistry) {
    let ignored = registry.scope_flag_ignored();
    if ignored.is_empty() {
        return;
    }
    println!();
    println!("Note: these default commands take no party argument and ignore --party:");
    for stage in ignored {
        println!("  - {} = {:?}", stage.id, stage.command.join(" "));
    }
}
