use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "civic-pipeline")]
#[command(
    version,
    about = "Run the election-data pipeline: ingestion, hydration, embeddings and AI summaries"
)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding pipeline.toml and .pipeline/ (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to the pipeline config file. Overrides PIPELINE_CONFIG and <project>/pipeline.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Run options when no subcommand is given
    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    /// Resume from this stage id (e.g. step5); earlier stages are skipped
    #[arg(long, value_name = "STAGE", value_parser = clap::builder::NonEmptyStringValueParser::new())]
    pub from: Option<String>,

    /// Restrict per-entity stages to one party (abbreviation, e.g. BIJ1)
    #[arg(long, value_name = "ABBR", value_parser = parse_party)]
    pub party: Option<String>,

    /// Show which stages would run without running them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline (default when no subcommand is given)
    Run(RunArgs),
    /// List the stages in execution order
    List,
    /// Show the last completed and failed stages
    Status,
    /// Clear the state log and run records
    Reset {
        #[arg(long)]
        force: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a pipeline.toml with every default spelled out
    Init,
}

/// Party values end up in the pipe-delimited state log.
fn parse_party(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err("party may not be empty".to_string());
    }
    if value.contains('|') || value.chars().any(char::is_control) {
        return Err("party may not contain '|' or control characters".to_string());
    }
    Ok(value.to_string())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        None => cmd::run_pipeline(&cli, project_dir, &cli.run).await?,
        Some(Commands::Run(args)) => cmd::run_pipeline(&cli, project_dir, args).await?,
        Some(Commands::List) => cmd::cmd_list(&cli, &project_dir)?,
        Some(Commands::Status) => cmd::cmd_status(&cli, &project_dir)?,
        Some(Commands::Reset { force }) => cmd::cmd_reset(&cli, &project_dir, *force)?,
        Some(Commands::Config { command }) => {
            cmd::cmd_config(&cli, &project_dir, command.clone())?
        }
    }

    Ok(())
}
