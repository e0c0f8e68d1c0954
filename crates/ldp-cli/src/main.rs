use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ldp_pipeline::{maybe_build_scheduler, BranchOutcome, Pipeline, PipelineConfig, DEFAULT_CONFIG_PATH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ldp")]
#[command(about = "Logistics data pipeline: bike-share and flight observations")]
struct Cli {
    /// Path to the pipeline configuration file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute a single pipeline run and exit.
    Run,
    /// Run on the configured cron schedule until interrupted.
    Schedule,
    /// Print stored row counts per observation table.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(&cli.config)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let pipeline = Pipeline::new(config).await?;
            let summary = pipeline.run_once().await;
            println!("run {} finished", summary.run_id);
            print_branch(&summary.bikes);
            print_branch(&summary.flights);
        }
        Commands::Schedule => {
            let mut config = config;
            config.pipeline.scheduler_enabled = true;
            let pipeline = Arc::new(Pipeline::new(config).await?);
            let mut sched = maybe_build_scheduler(pipeline)
                .await?
                .context("scheduler was not built despite being requested")?;
            sched.start().await.context("starting scheduler")?;
            info!("scheduler started, waiting for ctrl-c");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            info!("shutting down");
            sched.shutdown().await.context("stopping scheduler")?;
        }
        Commands::Status => {
            let pipeline = Pipeline::new(config).await?;
            let counts = pipeline.record_counts().await?;
            println!("bike_stations: {}", counts.bike_stations);
            println!("flights: {}", counts.flights);
        }
    }

    Ok(())
}

fn print_branch(outcome: &BranchOutcome) {
    let dropped: usize = outcome.dropped.values().sum();
    match &outcome.error {
        Some(err) => println!(
            "  {}: {:?} ({} extracted, error: {err})",
            outcome.feed.as_str(),
            outcome.state,
            outcome.extracted
        ),
        None => println!(
            "  {}: {:?} ({} extracted, {} loaded, {} dropped)",
            outcome.feed.as_str(),
            outcome.state,
            outcome.extracted,
            outcome.loaded,
            dropped
        ),
    }
}
