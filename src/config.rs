//! Run configuration: input column names and pipeline options.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::coordinator::Schedule;
use crate::source::{ReplayMode, SourceOptions};

/// Names of the input columns each metric reads.
///
/// Can be overridden with a JSON file; omitted keys keep their defaults:
/// ```json
/// {
///   "key": "vehicle_id",
///   "speed": "speed_mph"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub key: String,
    pub distance: String,
    pub duration: String,
    pub ignition_on: String,
    pub speed: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            key: "car_number".to_string(),
            distance: "distance_m".to_string(),
            duration: "duration_s".to_string(),
            ignition_on: "ignition_on".to_string(),
            speed: "speed_km_h".to_string(),
        }
    }
}

impl ColumnMap {
    /// Loads a column map from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read column map '{path}'"))?;
        let columns: ColumnMap = serde_json::from_str(&content)
            .with_context(|| format!("invalid column map in '{path}'"))?;
        Ok(columns)
    }
}

/// Everything needed for one read → aggregate → emit run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub columns: ColumnMap,
    pub source: SourceOptions,
    pub replay: ReplayMode,
    pub schedule: Schedule,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            columns: ColumnMap::default(),
            source: SourceOptions::default(),
            replay: ReplayMode::default(),
            schedule: Schedule::default(),
        }
    }
}
