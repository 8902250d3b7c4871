//! Runs every metric pass over the same source and merges the results.
//!
//! Each pass folds into a private map owned by its worker. Nothing is shared
//! while workers run; once every worker has been joined, the private maps are
//! merged into one [`ResultStore`] on the calling task, each contributing only
//! the slot its metric owns.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Instrument, debug, error, info, warn};

use crate::error::{PipelineError, ScanError};
use crate::metrics::{Accumulator, Metric};
use crate::source::RecordSource;
use crate::stats::{ResultStore, VehicleStats};

/// How metric passes are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// One blocking worker per accumulator, all running at once.
    #[default]
    Concurrent,
    /// One pass after another on the calling task.
    Sequential,
}

type PassOutcome = (Metric, Result<HashMap<String, VehicleStats>, PipelineError>);

pub struct Coordinator {
    source: Arc<RecordSource>,
    accumulators: Vec<Arc<dyn Accumulator>>,
    key_field: Arc<str>,
}

impl Coordinator {
    pub fn new(
        source: Arc<RecordSource>,
        accumulators: Vec<Arc<dyn Accumulator>>,
        key_field: &str,
    ) -> Self {
        Self {
            source,
            accumulators,
            key_field: Arc::from(key_field),
        }
    }

    /// Runs every pass to completion and merges them.
    ///
    /// All workers are joined even when one fails. Any failure fails the whole
    /// run: the first failure in accumulator order is returned and no partial
    /// store is produced.
    #[tracing::instrument(
        skip(self),
        fields(
            path = %self.source.path().display(),
            replay = ?self.source.mode(),
            passes = self.accumulators.len()
        )
    )]
    pub async fn run(&self, schedule: Schedule) -> Result<ResultStore, PipelineError> {
        let outcomes = match schedule {
            Schedule::Concurrent => self.run_concurrent().await,
            Schedule::Sequential => self.run_sequential(),
        };
        merge_outcomes(outcomes)
    }

    async fn run_concurrent(&self) -> Vec<PassOutcome> {
        let mut tasks = Vec::with_capacity(self.accumulators.len());

        for accumulator in &self.accumulators {
            let metric = accumulator.metric();
            let source = Arc::clone(&self.source);
            let accumulator = Arc::clone(accumulator);
            let key_field = Arc::clone(&self.key_field);
            let span = tracing::info_span!("metric_pass", metric = %metric);

            let task = tokio::task::spawn_blocking(move || {
                let _entered = span.enter();
                fold_pass(&source, accumulator.as_ref(), &key_field)
            });
            tasks.push((metric, task));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (metric, task) in tasks {
            let outcome = match task.await {
                Ok(result) => result.map_err(|source| PipelineError::Metric { metric, source }),
                Err(e) => Err(PipelineError::WorkerAborted {
                    metric,
                    reason: e.to_string(),
                }),
            };
            outcomes.push((metric, outcome));
        }
        outcomes
    }

    fn run_sequential(&self) -> Vec<PassOutcome> {
        self.accumulators
            .iter()
            .map(|accumulator| {
                let metric = accumulator.metric();
                let _entered = tracing::info_span!("metric_pass", metric = %metric).entered();
                let outcome = fold_pass(&self.source, accumulator.as_ref(), &self.key_field)
                    .map_err(|source| PipelineError::Metric { metric, source });
                (metric, outcome)
            })
            .collect()
    }
}

/// One complete pass of `accumulator` over `source`, folded into a fresh map
/// keyed by the value of `key_field`. Stops at the first bad row.
pub fn fold_pass(
    source: &RecordSource,
    accumulator: &dyn Accumulator,
    key_field: &str,
) -> Result<HashMap<String, VehicleStats>, ScanError> {
    let mut partials: HashMap<String, VehicleStats> = HashMap::new();
    let mut rows = 0u64;

    for record in source.records()? {
        let record = record?;
        let key = record
            .get(key_field)
            .ok_or_else(|| ScanError::MissingKeyField {
                line: record.line(),
                field: key_field.to_string(),
            })?;

        let partial = partials.entry(key.to_string()).or_default();
        accumulator
            .fold(&record, partial)
            .map_err(|reason| ScanError::MalformedRow {
                line: record.line(),
                reason,
            })?;
        rows += 1;
    }

    debug!(rows, vehicles = partials.len(), "Pass complete");
    Ok(partials)
}

fn merge_outcomes(outcomes: Vec<PassOutcome>) -> Result<ResultStore, PipelineError> {
    let mut store = ResultStore::new();
    let mut first_failure = None;
    let mut failed = 0usize;

    for (metric, outcome) in outcomes {
        match outcome {
            Ok(partials) => store.merge_pass(metric, partials),
            Err(e) => {
                error!(%metric, error = %e, "Metric pass failed");
                failed += 1;
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_failure {
        warn!(failed, "Discarding results of the run");
        return Err(e);
    }

    info!(vehicles = store.len(), "Metric passes merged");
    Ok(store)
}

/// Runs `accumulators` over `source` under `schedule` inside an
/// `aggregate` span.
pub async fn aggregate(
    source: Arc<RecordSource>,
    accumulators: Vec<Arc<dyn Accumulator>>,
    key_field: &str,
    schedule: Schedule,
) -> Result<ResultStore, PipelineError> {
    let span = tracing::info_span!("aggregate", ?schedule);
    let coordinator = Coordinator::new(source, accumulators, key_field);
    coordinator.run(schedule).instrument(span).await
}
