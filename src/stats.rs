use chrono::TimeDelta;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::metrics::Metric;
use crate::metrics::utility::format_delta;

/// Per-vehicle aggregate with one slot per metric family.
///
/// Every slot starts at zero, so a vehicle seen by only some passes still
/// reports a complete record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VehicleStats {
    pub distance: f64,
    pub operating_time: OperatingTime,
    pub utilization_s: f64,
    pub speed: SpeedAverage,
    pub trips: u64,
}

impl VehicleStats {
    /// Takes over the slot owned by `metric` from `other`, leaving every other
    /// slot untouched.
    pub fn absorb(&mut self, metric: Metric, other: VehicleStats) {
        match metric {
            Metric::Distance => self.distance = other.distance,
            Metric::OperatingTime => self.operating_time = other.operating_time,
            Metric::Utilization => self.utilization_s = other.utilization_s,
            Metric::AverageSpeed => self.speed = other.speed,
            Metric::TripCount => self.trips = other.trips,
        }
    }
}

/// Cumulative operating duration with its derived renderings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatingTime {
    pub seconds: f64,
    /// `H:MM:SS[.ffffff]`, prefixed with `N day(s), ` when non-zero.
    pub hms: String,
    pub days: i64,
}

impl Default for OperatingTime {
    fn default() -> Self {
        Self::from_seconds(0.0)
    }
}

impl OperatingTime {
    pub fn from_seconds(seconds: f64) -> Self {
        let mut time = Self {
            seconds,
            hms: String::new(),
            days: 0,
        };
        time.refresh();
        time
    }

    /// Adds `seconds` and recomputes the derived fields from the new total.
    pub fn add(&mut self, seconds: f64) {
        self.seconds += seconds;
        self.refresh();
    }

    /// Total rounded to whole microseconds.
    pub fn as_delta(&self) -> TimeDelta {
        TimeDelta::microseconds((self.seconds * 1_000_000.0).round_ties_even() as i64)
    }

    fn refresh(&mut self) {
        let delta = self.as_delta();
        let (days, hms) = format_delta(delta);
        self.days = days;
        self.hms = hms;
    }
}

/// Running mean over every speed sample seen for one vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpeedAverage {
    pub sum: f64,
    pub samples: u64,
    pub mean: f64,
}

impl SpeedAverage {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.samples += 1;
        self.mean = self.sum / self.samples as f64;
    }
}

/// Finished per-vehicle results, ordered by vehicle key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultStore {
    vehicles: BTreeMap<String, VehicleStats>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one pass's private results, copying only `metric`'s slot.
    /// Keys not yet present are inserted zero-initialized first.
    pub fn merge_pass(&mut self, metric: Metric, partials: HashMap<String, VehicleStats>) {
        for (key, partial) in partials {
            self.vehicles
                .entry(key)
                .or_default()
                .absorb(metric, partial);
        }
    }

    pub fn get(&self, key: &str) -> Option<&VehicleStats> {
        self.vehicles.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VehicleStats)> {
        self.vehicles.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vehicles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
