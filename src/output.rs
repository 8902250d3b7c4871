//! Output formatting and persistence for per-vehicle summaries.
//!
//! Rows are appended to a CSV table; the header is written only when the
//! table is new or empty.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::debug;

use crate::stats::{ResultStore, VehicleStats};

pub const HEADER: [&str; 8] = [
    "car_num",
    "total_distance",
    "operating_time",
    "utilisation",
    "avg_speed",
    "num_trips",
    "ERROR",
    "MSG",
];

/// One line of the output table. Metric columns are blank on error rows.
#[derive(Debug, Default, Serialize)]
pub struct SummaryRow {
    pub car_num: String,
    pub total_distance: Option<f64>,
    pub operating_time: Option<String>,
    pub utilisation: Option<f64>,
    pub avg_speed: Option<f64>,
    pub num_trips: Option<u64>,
    #[serde(rename = "ERROR")]
    pub error: bool,
    #[serde(rename = "MSG")]
    pub msg: String,
}

impl SummaryRow {
    pub fn from_stats(key: &str, stats: &VehicleStats) -> Self {
        SummaryRow {
            car_num: key.to_string(),
            total_distance: Some(stats.distance),
            operating_time: Some(stats.operating_time.hms.clone()),
            utilisation: Some(stats.utilization_s),
            avg_speed: Some(stats.speed.mean),
            num_trips: Some(stats.trips),
            error: false,
            msg: String::new(),
        }
    }

    /// An all-blank row carrying only the error flag and message.
    pub fn from_error(msg: &str) -> Self {
        SummaryRow {
            error: true,
            msg: msg.to_string(),
            ..Default::default()
        }
    }
}

/// Logs the finished store as pretty-printed JSON at debug level.
pub fn print_json(store: &ResultStore) -> Result<()> {
    debug!("{}", serde_json::to_string_pretty(store)?);
    Ok(())
}

/// Appends one row per vehicle to the table at `path`.
pub fn append_summary(path: impl AsRef<Path>, store: &ResultStore) -> Result<()> {
    let rows: Vec<SummaryRow> = store
        .iter()
        .map(|(key, stats)| SummaryRow::from_stats(key, stats))
        .collect();
    append_rows(path.as_ref(), &rows)
}

/// Appends a single error row to the table at `path`.
pub fn append_error(path: impl AsRef<Path>, msg: &str) -> Result<()> {
    append_rows(path.as_ref(), &[SummaryRow::from_error(msg)])
}

fn append_rows(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    debug!(path = %path.display(), needs_header, rows = rows.len(), "Appending CSV rows");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open '{}'", path.display()))?;

    // header handled here so an empty run still produces a valid table
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer.write_record(HEADER)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
