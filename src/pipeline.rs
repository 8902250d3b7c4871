//! Read → aggregate → emit for one input file.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::coordinator::aggregate;
use crate::error::PipelineError;
use crate::metrics;
use crate::output::{append_error, append_summary, print_json};
use crate::source::RecordSource;
use crate::stats::ResultStore;

/// What a run produced.
#[derive(Debug)]
pub struct RunReport {
    pub vehicles: usize,
    pub elapsed: Duration,
    /// The message written to the error row, when the run failed.
    pub error: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs the full pipeline against `config.input`, appending to `config.output`.
///
/// An aggregation failure is not returned as an error: it is written to the
/// output as a single error row and reported in [`RunReport::error`]. Only a
/// failure to write the output itself is returned as `Err`.
#[tracing::instrument(
    skip(config),
    fields(input = %config.input.display(), output = %config.output.display())
)]
pub async fn run_pipeline(config: &PipelineConfig) -> Result<RunReport> {
    let start = Instant::now();

    let report = match summarize(config).await {
        Ok(store) => {
            print_json(&store)?;
            append_summary(&config.output, &store)?;
            RunReport {
                vehicles: store.len(),
                elapsed: start.elapsed(),
                error: None,
            }
        }
        Err(e) => {
            error!(error = %e, "Aggregation failed");
            let msg = format!("Error : {e}");
            append_error(&config.output, &msg)?;
            RunReport {
                vehicles: 0,
                elapsed: start.elapsed(),
                error: Some(msg),
            }
        }
    };

    info!(
        vehicles = report.vehicles,
        succeeded = report.succeeded(),
        elapsed_secs = report.elapsed.as_secs_f64(),
        "Run finished"
    );
    Ok(report)
}

async fn summarize(config: &PipelineConfig) -> Result<ResultStore, PipelineError> {
    let source = RecordSource::open(&config.input, config.source.clone(), config.replay)
        .map_err(|source| PipelineError::Open {
            path: config.input.display().to_string(),
            source,
        })?;

    let accumulators = metrics::standard(&config.columns);
    aggregate(
        Arc::new(source),
        accumulators,
        &config.columns.key,
        config.schedule,
    )
    .await
}
