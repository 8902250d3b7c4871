//! CLI entry point for the fleet telemetry rollup.
//!
//! Reads a telemetry export, computes per-vehicle distance, operating time,
//! utilisation, average speed and trip count, and appends one summary row per
//! vehicle to an output CSV table.

use anyhow::{Context, Result, bail};
use clap::Parser;
use fleet_rollup::{
    ColumnMap, PipelineConfig, Schedule, run_pipeline,
    source::{ReplayMode, SourceOptions},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "fleet_rollup")]
#[command(about = "Summarize vehicle telemetry into a per-vehicle CSV table", long_about = None)]
struct Cli {
    /// Telemetry export to summarize (.csv, or .gz for gzip-compressed input)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// CSV table to append results to
    #[arg(short, long, default_value = "data/output.csv")]
    output: PathBuf,

    /// Field delimiter of the input
    #[arg(short, long, default_value_t = ',')]
    delimiter: char,

    /// Column holding the vehicle identifier (overrides the column map)
    #[arg(short, long)]
    key_field: Option<String>,

    /// JSON file overriding input column names
    #[arg(short, long)]
    columns: Option<String>,

    /// How metric passes re-read the input
    #[arg(long, value_enum, default_value_t = ReplayMode::Cached)]
    replay: ReplayMode,

    /// Run metric passes one after another instead of concurrently
    #[arg(long, default_value_t = false)]
    sequential: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/fleet_rollup.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("fleet_rollup.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = build_config(cli)?;

    let report = run_pipeline(&config).await?;

    info!(
        elapsed_secs = report.elapsed.as_secs_f64(),
        "Processed in {:.4} seconds",
        report.elapsed.as_secs_f64()
    );

    if let Some(msg) = report.error {
        warn!(output = %config.output.display(), "Error row written");
        bail!(msg);
    }

    Ok(())
}

/// Turns CLI arguments into a [`PipelineConfig`].
fn build_config(cli: Cli) -> Result<PipelineConfig> {
    let mut columns = match &cli.columns {
        Some(path) => ColumnMap::load(path)?,
        None => ColumnMap::default(),
    };
    if let Some(key_field) = cli.key_field {
        columns.key = key_field;
    }

    let delimiter = u8::try_from(cli.delimiter)
        .ok()
        .filter(u8::is_ascii)
        .with_context(|| {
            format!(
                "delimiter '{}' must be a single ASCII character",
                cli.delimiter
            )
        })?;

    let mut config = PipelineConfig::new(cli.input, cli.output);
    config.columns = columns;
    config.source = SourceOptions {
        delimiter,
        ..SourceOptions::default()
    };
    config.replay = cli.replay;
    config.schedule = if cli.sequential {
        Schedule::Sequential
    } else {
        Schedule::Concurrent
    };

    Ok(config)
}
