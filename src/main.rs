//! Trip-Risk Pipeline CLI
//!
//! Usage:
//!   # Clean raw trip records, write cleaned CSV + exclusion log:
//!   cargo run --bin triprisk -- clean --input data/raw/yellow_tripdata_2019-01.csv
//!
//!   # Score a previously cleaned file:
//!   cargo run --bin triprisk -- score --cleaned data/processed/cleaned_trips.csv
//!
//!   # Full run, cleaning and scoring in one process:
//!   cargo run --bin triprisk -- run --input data/raw/yellow_tripdata_2019-01.csv

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use triprisk_backend::config::PipelineConfig;
use triprisk_backend::pipeline::{CleaningOutcome, CleaningPipeline};
use triprisk_backend::risk::compute_risk_scores;
use triprisk_backend::sinks;
use triprisk_backend::stats::{compute_zone_hour_metrics, compute_zone_revenue_metrics};
use triprisk_backend::zones::ZoneCatalog;

#[derive(Parser, Debug)]
#[command(name = "triprisk")]
#[command(about = "Trip record cleaning and zone-hour risk scoring pipeline")]
struct Args {
    /// Optional TOML config overlay; unset fields keep compiled defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Process at most N input rows (bounded test runs)
    #[arg(long, global = true)]
    max_rows: Option<u64>,

    /// Progress batch size
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct CleanArgs {
    /// Raw trip records CSV
    #[arg(long)]
    input: PathBuf,

    /// Zone lookup CSV; falls back to the full contiguous range if missing
    #[arg(long, default_value = "data/raw/taxi_zone_lookup.csv")]
    zone_lookup: PathBuf,

    /// Cleaned trips output
    #[arg(long, default_value = "data/processed/cleaned_trips.csv")]
    cleaned_out: PathBuf,

    /// Exclusion ledger output
    #[arg(long, default_value = "logs/excluded_records.log")]
    excluded_out: PathBuf,
}

#[derive(clap::Args, Debug)]
struct ScoreArgs {
    /// Previously cleaned trips CSV
    #[arg(long, default_value = "data/processed/cleaned_trips.csv")]
    cleaned: PathBuf,

    /// Directory for the three metrics JSON files
    #[arg(long, default_value = "data/processed")]
    metrics_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate raw records and persist cleaned trips + exclusion ledger
    Clean(CleanArgs),

    /// Compute exposure, volatility, and risk metrics from cleaned trips
    Score(ScoreArgs),

    /// Clean and score in one process
    Run {
        #[command(flatten)]
        clean: CleanArgs,

        #[arg(long, default_value = "data/processed")]
        metrics_dir: PathBuf,
    },
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(max_rows) = args.max_rows {
        config.max_rows = Some(max_rows);
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    Ok(config)
}

fn clean_stage(config: &PipelineConfig, args: &CleanArgs) -> Result<CleaningOutcome> {
    let zones = ZoneCatalog::load(&args.zone_lookup, config.expected_zone_count);
    let pipeline = CleaningPipeline::new(config.clone(), zones);
    let outcome = pipeline.run_file(&args.input)?;

    sinks::write_cleaned_trips(&args.cleaned_out, &outcome.trips)?;
    sinks::write_exclusion_log(&args.excluded_out, &outcome.exclusions)?;
    Ok(outcome)
}

fn score_stage(
    config: &PipelineConfig,
    trips: &[triprisk_backend::models::ValidatedTrip],
    metrics_dir: &PathBuf,
) -> Result<()> {
    let exposure = compute_zone_hour_metrics(trips);
    let revenue = compute_zone_revenue_metrics(trips);
    let scores = compute_risk_scores(&exposure, &revenue, config);

    sinks::write_zone_hour_metrics(&metrics_dir.join("zone_hour_metrics.json"), &exposure)?;
    sinks::write_zone_revenue_metrics(&metrics_dir.join("zone_revenue_metrics.json"), &revenue)?;
    sinks::write_risk_scores(&metrics_dir.join("zone_risk_scores.json"), &scores)?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("triprisk=info".parse().unwrap())
                .add_directive("triprisk_backend=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    match &args.command {
        Commands::Clean(clean) => {
            clean_stage(&config, clean)?;
        }
        Commands::Score(score) => {
            let trips = sinks::read_cleaned_trips(&score.cleaned)?;
            score_stage(&config, &trips, &score.metrics_dir)?;
        }
        Commands::Run { clean, metrics_dir } => {
            let outcome = clean_stage(&config, clean)?;
            score_stage(&config, &outcome.trips, metrics_dir)?;
        }
    }

    info!("Pipeline complete");
    Ok(())
}
