use crate::orchestrator::{
    ExecutionObserver, RunMode, RunReport, RunRequest, RunState, SkipReason, StageOutcome,
};
use crate::processor::ExitSignal;
use crate::stage::StageDefinition;
use crate::ui::icons::{CHECK, CLOCK, CROSS, RUNNING, SKIP, SPARKLE};
use anyhow::Result;
use console::style;

/// Line-oriented terminal trace for a pipeline run.
///
/// Stage commands inherit the terminal, so the trace is plain lines printed
/// between stages rather than live progress bars:
/// - a heading with id and label before each executed stage
/// - a one-line notice for each skipped stage
/// - a single success marker at the end, only when no stage failed
pub struct PipelineUI {
    total_stages: usize,
    verbose: bool,
}

impl PipelineUI {
    pub fn new(total_stages: usize, verbose: bool) -> Self {
        Self {
            total_stages,
            verbose,
        }
    }

    fn print_line(&self, msg: impl AsRef<str>) {
        println!("{}", msg.as_ref());
    }

    pub fn print_separator(&self) {
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
    }

    /// Summary of what the run was asked to do.
    pub fn print_run_header(&self, request: &RunRequest) {
        self.print_line(format!(
            "{} ({} stages)",
            style("Election data pipeline").bold(),
            self.total_stages
        ));
        if let Some(from) = &request.resume_from {
            self.print_line(format!("  {} {}", style("Resuming from:").dim(), from));
        }
        if let Some(scope) = &request.scope_filter {
            self.print_line(format!("  {} {}", style("Party filter:").dim(), scope));
        }
    }

    /// Print the decisions of a dry run, one line per stage.
    pub fn print_plan(&self, plan: &[(&StageDefinition, RunMode)]) {
        for (stage, mode) in plan {
            let action = match mode {
                RunMode::Unfiltered => style("run".to_string()).green(),
                RunMode::Filtered(scope) => style(format!("run ({})", scope)).green(),
                RunMode::Skip(reason) => style(format!("skip: {}", reason)).dim(),
            };
            self.print_line(format!(
                "  {:<8} {:<32} {}",
                stage.id,
                action,
                style(&stage.label).dim()
            ));
        }
    }

    pub fn print_report(&self, report: &RunReport, request: &RunRequest) {
        match &report.state {
            RunState::Completed => {
                let executed = report.outcomes.iter().filter(|o| o.executed).count();
                self.print_line("");
                self.print_line(format!(
                    "{}{} ({} of {} stages executed)",
                    SPARKLE,
                    style("Pipeline complete").green().bold(),
                    executed,
                    report.outcomes.len()
                ));
            }
            RunState::Aborted { stage_id } => {
                let label = report
                    .outcome(stage_id)
                    .map(|o| o.label.as_str())
                    .unwrap_or_default();
                self.print_line("");
                self.print_line(format!(
                    "{}{} at {} ({})",
                    CROSS,
                    style("Pipeline aborted").red().bold(),
                    style(stage_id).yellow().bold(),
                    label
                ));
                self.print_line(format!(
                    "  Fix the problem, then resume with: {}",
                    style(resume_hint(stage_id, request.scope_filter.as_deref())).cyan()
                ));
            }
            _ => {}
        }
    }
}

/// CLI arguments that repeat a run from `stage_id` with the same party filter.
pub fn resume_hint(stage_id: &str, scope_filter: Option<&str>) -> String {
    match scope_filter {
        Some(filter) => format!("--from {} --party {}", stage_id, shell_quote(filter)),
        None => format!("--from {}", stage_id),
    }
}

/// Single-quote `value` for POSIX shells unless it is made of safe characters.
fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.,:/@+=".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Heading printed before a stage runs.
pub fn stage_heading(stage: &StageDefinition, scope: Option<&str>) -> String {
    let scope_note = match scope {
        Some(scope) => format!(" {}", style(format!("[party: {}]", scope)).cyan()),
        None => String::new(),
    };
    format!(
        "{}[{}] {}{}",
        RUNNING,
        style(&stage.id).yellow().bold(),
        stage.label,
        scope_note
    )
}

/// One-line skip notice.
pub fn skip_notice(stage: &StageDefinition, reason: SkipReason) -> String {
    let detail = match reason {
        SkipReason::BeforeResumePoint => "before resume point".to_string(),
        SkipReason::NotScopeApplicable => {
            format!("{} stage, not run for a single party", stage.scope)
        }
    };
    format!("{}skip {}: {}", SKIP, style(&stage.id).dim(), style(detail).dim())
}

fn format_elapsed(outcome: &StageOutcome) -> Option<String> {
    let (start, end) = (outcome.started_at?, outcome.ended_at?);
    let secs = (end - start).num_seconds().max(0);
    Some(if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    })
}

impl ExecutionObserver for PipelineUI {
    fn stage_started(&self, stage: &StageDefinition, scope: Option<&str>) -> Result<()> {
        self.print_line("");
        self.print_separator();
        self.print_line(stage_heading(stage, scope));
        self.print_separator();
        if self.verbose {
            self.print_line(format!(
                "  {} {}",
                style("Command:").dim(),
                stage.command.join(" ")
            ));
        }
        Ok(())
    }

    fn stage_skipped(&self, stage: &StageDefinition, reason: SkipReason) -> Result<()> {
        self.print_line(skip_notice(stage, reason));
        Ok(())
    }

    fn stage_finished(&self, stage: &StageDefinition, outcome: &StageOutcome) -> Result<()> {
        let elapsed = format_elapsed(outcome)
            .map(|e| format!(" {}{}", CLOCK, style(e).dim()))
            .unwrap_or_default();
        match &outcome.exit {
            Some(ExitSignal::Success) => self.print_line(format!(
                "{}{} done{}",
                CHECK,
                style(&stage.id).green().bold(),
                elapsed
            )),
            Some(exit) => self.print_line(format!(
                "{}{} failed: {}{}",
                CROSS,
                style(&stage.id).red().bold(),
                exit,
                elapsed
            )),
            None => {}
        }
        Ok(())
    }
}
