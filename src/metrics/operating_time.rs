use crate::error::MalformedReason;
use crate::metrics::utility::read_number;
use crate::metrics::{Accumulator, Metric};
use crate::source::Record;
use crate::stats::VehicleStats;

/// Sums operating duration in seconds; the clock rendering and day count are
/// rebuilt from the running total on every row.
pub struct OperatingTimeAccumulator {
    field: String,
}

impl OperatingTimeAccumulator {
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
        }
    }
}

impl Accumulator for OperatingTimeAccumulator {
    fn metric(&self) -> Metric {
        Metric::OperatingTime
    }

    fn fold(&self, record: &Record, partial: &mut VehicleStats) -> Result<(), MalformedReason> {
        let seconds = read_number(record, &self.field)?;
        partial.operating_time.add(seconds);
        Ok(())
    }
}
