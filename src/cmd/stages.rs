//! Stage listing, status and reset commands.

use anyhow::Result;
use std::path::Path;

use super::super::Cli;

pub fn cmd_list(cli: &Cli, project_dir: &Path) -> Result<()> {
    use civic_pipeline::config::Config;

    let config = Config::new(project_dir.to_path_buf(), cli.config.clone(), cli.verbose)?;
    let registry = config.registry()?;

    println!();
    println!("Pipeline stages ({} total):", registry.len());
    println!();
    println!("  {:<4} {:<8} {:<13} {}", "#", "Stage", "Scope", "Label");
    println!("  {}", "-".repeat(72));

    for (i, stage) in registry.stages().iter().enumerate() {
        println!(
            "  {:<4} {:<8} {:<13} {}",
            i + 1,
            stage.id,
            stage.scope.to_string(),
            stage.label
        );
        if cli.verbose {
            println!("       {}", stage.command.join(" "));
        }
    }

    println!();
    println!(
        "Per-entity stages receive '{} <ABBR>' when run with --party.",
        config.scope_flag
    );
    let ignored = registry.scope_flag_ignored();
    if !ignored.is_empty() {
        let ids: Vec<&str> = ignored.iter().map(|s| s.id.as_str()).collect();
        println!(
            "Note: the default commands of {} take no party argument; override them in pipeline.toml to honour --party.",
            ids.join(", ")
        );
    }
    println!();
    Ok(())
}

pub fn cmd_status(cli: &Cli, project_dir: &Path) -> Result<()> {
    use civic_pipeline::audit::AuditLogger;
    use civic_pipeline::config::Config;
    use civic_pipeline::orchestrator::{RunState, StageStatus, StateManager};
    use civic_pipeline::ui::resume_hint;

    let config = Config::new(project_dir.to_path_buf(), cli.config.clone(), cli.verbose)?;

    println!();
    println!("Pipeline Status");
    println!("===============");
    println!();

    let config_status = if config.config_file.exists() {
        config.config_file.display().to_string()
    } else {
        "none (using built-in stage commands)".to_string()
    };
    println!("Config:  {}", config_status);
    println!("Workdir: {}", config.workdir.display());

    let mut audit = AuditLogger::new(&config.state_dir);
    if audit.load_current()?
        && let Some(run) = audit.current_run()
    {
        println!();
        println!(
            "Interrupted run {} (started {})",
            run.run_id,
            run.started_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    let state = StateManager::new(config.state_file.clone());
    let entries = state.get_entries()?;

    println!();
    if entries.is_empty() {
        println!("Execution: Not started");
        println!();
        println!("Run 'civic-pipeline' to run every stage.");
        println!();
        return Ok(());
    }

    let runs = audit.list_runs()?;
    println!("Execution Progress:");
    println!("  Recorded runs: {}", runs.len());
    if let Some(run) = audit.latest_run()? {
        let outcome = match (&run.state, &run.error) {
            (_, Some(error)) => format!("error: {}", error),
            (Some(RunState::Aborted { stage_id }), _) => format!("aborted at {}", stage_id),
            (Some(RunState::Completed), _) => "completed".to_string(),
            _ => "unfinished".to_string(),
        };
        let party = run
            .request
            .scope_filter
            .as_deref()
            .map(|p| format!(" [party: {}]", p))
            .unwrap_or_default();
        println!(
            "  Last run: {} ({}){} {}",
            outcome,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            party,
            run.run_id.simple()
        );
    }
    if let Some(last) = state.get_last_completed_stage() {
        println!("  Last completed stage: {}", last);
    }
    if let Some(failed) = state.last_with_status(StageStatus::Failed)? {
        println!(
            "  Last failed stage: {} ({})",
            failed.stage,
            failed.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if let Some(resume) = state.suggested_resume_point()? {
        println!(
            "  Resume with: {}",
            resume_hint(&resume.stage, resume.filter.as_deref())
        );
    }

    println!();
    println!("Recent activity:");
    for entry in entries.iter().rev().take(5) {
        let scope = entry
            .scope
            .as_deref()
            .map(|s| format!(" [party: {}]", s))
            .unwrap_or_default();
        println!(
            "  {}: {}{} ({})",
            entry.stage,
            entry.status.as_str(),
            scope,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();
    Ok(())
}

pub fn cmd_reset(cli: &Cli, project_dir: &Path, force: bool) -> Result<()> {
    use civic_pipeline::audit::AuditLogger;
    use civic_pipeline::config::Config;
    use civic_pipeline::orchestrator::StateManager;
    use dialoguer::Confirm;

    let config = Config::new(project_dir.to_path_buf(), cli.config.clone(), cli.verbose)?;

    if !force {
        let confirm = Confirm::new()
            .with_prompt("This will clear the state log and all run records. Are you sure?")
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let state = StateManager::new(config.state_file.clone());
    state.reset()?;

    let mut audit = AuditLogger::new(&config.state_dir);
    let removed = audit.clear()?;

    println!("Reset complete ({} run records removed)", removed);
    Ok(())
}
