use crate::error::MalformedReason;
use crate::metrics::{Accumulator, Metric};
use crate::source::Record;
use crate::stats::VehicleStats;

/// Counts one trip per row.
pub struct TripCountAccumulator;

impl Accumulator for TripCountAccumulator {
    fn metric(&self) -> Metric {
        Metric::TripCount
    }

    fn fold(&self, _record: &Record, partial: &mut VehicleStats) -> Result<(), MalformedReason> {
        partial.trips += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::test_support::record;

    #[test]
    fn test_counts_every_row() {
        let mut stats = VehicleStats::default();
        let row = record(&[("car_number", "A1")]);

        for _ in 0..5 {
            TripCountAccumulator.fold(&row, &mut stats).unwrap();
        }

        assert_eq!(stats.trips, 5);
    }
}
