//! Error taxonomy for ingestion and aggregation.

use std::io;

use thiserror::Error;

use crate::metrics::Metric;

/// Why a single row could not be folded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedReason {
    #[error("expected at least {required} fields, found {found}")]
    TooFewFields { required: usize, found: usize },
    #[error("field '{0}' is missing")]
    MissingField(String),
    #[error("field '{field}' value '{value}' is not numeric")]
    NotNumeric { field: String, value: String },
}

/// Failure while scanning the input for one pass.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: MalformedReason },
    #[error("row at line {line} has no '{field}' key field")]
    MissingKeyField { line: u64, field: String },
    #[error("explicit header rejected: {0}")]
    ExplicitHeader(MalformedReason),
    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse input: {0}")]
    Csv(#[from] csv::Error),
}

/// Whole-run failure reported to the caller and rendered by the emitter.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not open input '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: ScanError,
    },
    #[error("{metric} pass failed: {source}")]
    Metric {
        metric: Metric,
        #[source]
        source: ScanError,
    },
    #[error("{metric} worker aborted: {reason}")]
    WorkerAborted { metric: Metric, reason: String },
}
