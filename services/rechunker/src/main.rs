//! Climate projection rechunker service.
//!
//! Rechunks a monthly, variable-major projection archive into per-tile
//! multi-variable daily units over the national 1km grid. One invocation
//! is one run; interrupted runs resume from the progress ledger.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use chess_common::{DateRange, GridExtent, Resolution};
use chess_rechunk::{run, EngineConfig, RechunkRequest};

/// Default variable set carried by the archive.
const DEFAULT_VARIABLES: &str = "tas,tasmax,tasmin,pr,rlds,rsds,hurs,sfcWind,psurf";

#[derive(Parser, Debug)]
#[command(name = "rechunker")]
#[command(about = "Rechunks monthly climate projections into per-tile daily units")]
struct Args {
    /// Directory holding the monthly source segments
    #[arg(long, env = "RECHUNK_INPUT_ROOT")]
    input_root: PathBuf,

    /// Directory receiving the tiled units and the progress ledger
    #[arg(long, env = "RECHUNK_OUTPUT_ROOT")]
    output_root: PathBuf,

    /// Emission scenarios to process
    #[arg(long, value_delimiter = ',', default_value = "rcp85")]
    scenarios: Vec<String>,

    /// Ensemble members to process
    #[arg(long, value_delimiter = ',', default_value = "01")]
    ensembles: Vec<String>,

    /// Variables to stack, in output order
    #[arg(long, value_delimiter = ',', default_value = DEFAULT_VARIABLES)]
    variables: Vec<String>,

    /// First day of the output range (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Last day of the output range, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,

    /// Tiling resolution: "fine" (10km tiles) or "coarse" (100km tiles)
    #[arg(long, default_value = "fine")]
    resolution: String,

    /// Maximum tile plans assembled concurrently
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Memory budget for in-flight assemblies, in megabytes
    #[arg(long, default_value_t = 4096)]
    memory_budget_mb: usize,

    /// Grid extent in 1km cells, west-east
    #[arg(long, default_value_t = 700)]
    grid_cols: u32,

    /// Grid extent in 1km cells, south-north
    #[arg(long, default_value_t = 1300)]
    grid_rows: u32,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting climate projection rechunker");

    let resolution = Resolution::parse(&args.resolution)
        .with_context(|| format!("unknown resolution {:?}", args.resolution))?;
    let range = DateRange::new(args.start, args.end)
        .context("invalid date range")?;

    let config = EngineConfig {
        input_root: args.input_root,
        output_root: args.output_root,
        concurrency: args.concurrency,
        memory_budget_mb: args.memory_budget_mb,
        extent: GridExtent::new(args.grid_cols, args.grid_rows),
    };

    let mut requests = Vec::new();
    for scenario in &args.scenarios {
        for ensemble in &args.ensembles {
            requests.push(RechunkRequest {
                scenario: scenario.clone(),
                ensemble: ensemble.clone(),
                variables: args.variables.clone(),
                range,
                resolution,
            });
        }
    }

    info!(
        requests = requests.len(),
        variables = args.variables.len(),
        range = %range,
        resolution = %resolution,
        "Built rechunk requests"
    );

    let summary = run(&config, &requests).await?;

    for failure in &summary.failed {
        warn!(plan = %failure.key, error = %failure.error, "Failed plan");
    }
    info!(
        completed = summary.completed,
        skipped = summary.skipped,
        failed = summary.failed.len(),
        "Run complete"
    );

    if !summary.is_success() {
        bail!("{} plan(s) failed", summary.failed.len());
    }
    Ok(())
}
