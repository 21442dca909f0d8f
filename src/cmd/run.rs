//! Pipeline execution: `civic-pipeline [run]`.

use anyhow::Result;
use std::path::PathBuf;

use civic_pipeline::orchestrator::{
    ExecutionObserver, RunState, SkipReason, StageOutcome, StageStatus, StateManager,
};
use civic_pipeline::stage::StageDefinition;
use civic_pipeline::ui::PipelineUI;
use tracing::warn;

use super::super::{Cli, RunArgs};

/// Forwards stage events to the terminal trace and the state log.
struct RunTracker<'a> {
    ui: &'a PipelineUI,
    state: &'a StateManager,
    filter: Option<&'a str>,
}

impl ExecutionObserver for RunTracker<'_> {
    fn stage_started(&self, stage: &StageDefinition, scope: Option<&str>) -> Result<()> {
        self.ui.stage_started(stage, scope)?;
        self.state
            .save(&stage.id, StageStatus::Started, scope, self.filter)
    }

    fn stage_skipped(&self, stage: &StageDefinition, reason: SkipReason) -> Result<()> {
        self.ui.stage_skipped(stage, reason)?;
        self.state
            .save(&stage.id, StageStatus::Skipped, None, self.filter)
    }

    fn stage_finished(&self, stage: &StageDefinition, outcome: &StageOutcome) -> Result<()> {
        self.ui.stage_finished(stage, outcome)?;
        let status = if outcome.failed {
            StageStatus::Failed
        } else {
            StageStatus::Completed
        };
        self.state
            .save(&stage.id, status, outcome.scope.as_deref(), self.filter)
    }
}

pub async fn run_pipeline(cli: &Cli, project_dir: PathBuf, args: &RunArgs) -> Result<()> {
    use civic_pipeline::audit::AuditLogger;
    use civic_pipeline::config::Config;
    use civic_pipeline::errors::PipelineError;
    use civic_pipeline::orchestrator::{PipelineExecutor, RunRequest};
    use civic_pipeline::processor::{CommandProcessor, ExitSignal};

    let config = Config::new(project_dir, cli.config.clone(), cli.verbose)?;
    let registry = config.registry()?;

    let processor = CommandProcessor::new(&config.workdir, config.scope_flag.clone())
        .with_env(config.child_env()?);
    let executor = PipelineExecutor::new(registry, processor);
    let request = RunRequest::new(args.from.clone(), args.party.clone());
    let ui = PipelineUI::new(executor.registry().len(), cli.verbose);

    if args.dry_run {
        let plan = executor.plan(&request)?;
        ui.print_run_header(&request);
        println!();
        ui.print_plan(&plan);
        println!();
        println!("Dry run: no stages were executed.");
        return Ok(());
    }

    // Fail before touching the state log or audit records.
    if let Err(e) = executor.validate(&request) {
        if e.is_configuration() {
            println!("Run 'civic-pipeline list' to see the stage ids.");
        }
        return Err(e.into());
    }

    config.ensure_directories()?;
    let state = StateManager::new(config.state_file.clone());
    let mut audit = AuditLogger::new(&config.state_dir);
    audit.start_run(request.clone(), config.project_dir.clone())?;

    ui.print_run_header(&request);
    if request.scope_filter.is_some() {
        for stage in executor.registry().scope_flag_ignored() {
            warn!(
                stage = %stage.id,
                "default command takes no party argument and will process every party"
            );
        }
    }

    let tracker = RunTracker {
        ui: &ui,
        state: &state,
        filter: request.scope_filter.as_deref(),
    };
    let report = match executor.execute(&request, &tracker).await {
        Ok(report) => report,
        Err(e) => {
            audit.record_error(&format!("{:#}", e))?;
            audit.finish_run()?;
            return Err(e.into());
        }
    };

    audit.record_report(&report)?;
    let run_file = audit.finish_run()?;
    ui.print_report(&report, &request);

    if cli.verbose {
        println!("Run record: {}", run_file.display());
    }

    match &report.state {
        RunState::Aborted { stage_id } => {
            let outcome = report.outcome(stage_id).ok_or_else(|| {
                anyhow::anyhow!("No outcome recorded for aborted stage {}", stage_id)
            })?;
            Err(PipelineError::StageFailed {
                id: stage_id.clone(),
                label: outcome.label.clone(),
                exit: outcome
                    .exit
                    .clone()
                    .unwrap_or_else(|| ExitSignal::Error("no exit status recorded".into())),
            }
            .into())
        }
        _ => Ok(()),
    }
}
