use crate::error::MalformedReason;
use crate::metrics::utility::read_number;
use crate::metrics::{Accumulator, Metric};
use crate::source::Record;
use crate::stats::VehicleStats;

/// Running mean of the per-row speed, with the sample count kept per vehicle.
pub struct AverageSpeedAccumulator {
    field: String,
}

impl AverageSpeedAccumulator {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
        }
    }
}

impl Accumulator for AverageSpeedAccumulator {
    fn metric(&self) -> Metric {
        Metric::AverageSpeed
    }

    fn fold(&self, record: &Record, partial: &mut VehicleStats) -> Result<(), MalformedReason> {
        partial.speed.push(read_number(record, &self.field)?);
        Ok(())
    }
}
