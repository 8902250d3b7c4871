//! Plain running sums: distance travelled and ignition-on time.

use crate::error::MalformedReason;
use crate::metrics::utility::read_number;
use crate::metrics::{Accumulator, Metric};
use crate::source::Record;
use crate::stats::VehicleStats;

/// Sums the per-row distance.
pub struct DistanceAccumulator {
    field: String,
}

impl DistanceAccumulator {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
        }
    }
}

impl Accumulator for DistanceAccumulator {
    fn metric(&self) -> Metric {
        Metric::Distance
    }

    fn fold(&self, record: &Record, partial: &mut VehicleStats) -> Result<(), MalformedReason> {
        partial.distance += read_number(record, &self.field)?;
        Ok(())
    }
}

/// Sums the per-row seconds spent with the ignition on.
pub struct UtilizationAccumulator {
    field: String,
}

impl UtilizationAccumulator {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
        }
    }
}

impl Accumulator for UtilizationAccumulator {
    fn metric(&self) -> Metric {
        Metric::Utilization
    }

    fn fold(&self, record: &Record, partial: &mut VehicleStats) -> Result<(), MalformedReason> {
        partial.utilization_s += read_number(record, &self.field)?;
        Ok(())
    }
}
