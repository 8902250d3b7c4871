//! Per-vehicle metric accumulators.
//!
//! Each accumulator folds one record at a time into the slot of
//! [`VehicleStats`] it owns. Folding every record for a vehicle in input order
//! yields that vehicle's final value, however the work is split across
//! vehicles.

pub mod operating_time;
pub mod speed;
pub mod sums;
pub mod trips;
pub mod utility;

pub use operating_time::OperatingTimeAccumulator;
pub use speed::AverageSpeedAccumulator;
pub use sums::{DistanceAccumulator, UtilizationAccumulator};
pub use trips::TripCountAccumulator;

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::ColumnMap;
use crate::error::MalformedReason;
use crate::source::Record;
use crate::stats::VehicleStats;

/// The metric families reported per vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Distance,
    OperatingTime,
    Utilization,
    AverageSpeed,
    TripCount,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Distance,
        Metric::OperatingTime,
        Metric::Utilization,
        Metric::AverageSpeed,
        Metric::TripCount,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Distance => "distance",
            Metric::OperatingTime => "operating_time",
            Metric::Utilization => "utilization",
            Metric::AverageSpeed => "average_speed",
            Metric::TripCount => "trip_count",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folds records into the [`VehicleStats`] slot owned by [`Self::metric`].
pub trait Accumulator: Send + Sync {
    fn metric(&self) -> Metric;

    /// Applies one record to `partial`, which belongs to the record's vehicle.
    /// Must only write the slot owned by this accumulator's metric.
    fn fold(&self, record: &Record, partial: &mut VehicleStats) -> Result<(), MalformedReason>;
}

/// The five standard accumulators, reading the columns named in `columns`.
pub fn standard(columns: &ColumnMap) -> Vec<Arc<dyn Accumulator>> {
    vec![
        Arc::new(DistanceAccumulator::new(&columns.distance)),
        Arc::new(OperatingTimeAccumulator::new(&columns.duration)),
        Arc::new(UtilizationAccumulator::new(&columns.ignition_on)),
        Arc::new(AverageSpeedAccumulator::new(&columns.speed)),
        Arc::new(TripCountAccumulator),
    ]
}
