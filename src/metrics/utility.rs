use chrono::TimeDelta;
use std::fmt::Write;

use crate::error::MalformedReason;
use crate::source::Record;

const MICROS_PER_SECOND: i64 = 1_000_000;
const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;

/// Reads `field` from `record` as a finite float.
pub fn read_number(record: &Record, field: &str) -> Result<f64, MalformedReason> {
    let raw = record
        .get(field)
        .ok_or_else(|| MalformedReason::MissingField(field.to_string()))?;

    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| MalformedReason::NotNumeric {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

/// Splits a duration into its floor day count and a clock rendering.
///
/// Renders as `H:MM:SS`, with `.ffffff` when there are leftover microseconds
/// and a `N day, ` / `N days, ` prefix when the day count is non-zero.
/// Negative durations borrow whole days, so -1s is `-1 day, 23:59:59`.
pub fn format_delta(delta: TimeDelta) -> (i64, String) {
    let micros = delta.num_microseconds().unwrap_or(if delta < TimeDelta::zero() {
        i64::MIN
    } else {
        i64::MAX
    });

    let days = micros.div_euclid(MICROS_PER_DAY);
    let rest = micros.rem_euclid(MICROS_PER_DAY);
    let secs = rest / MICROS_PER_SECOND;
    let frac = rest % MICROS_PER_SECOND;

    let mut out = String::new();
    if days != 0 {
        let plural = if days.abs() == 1 { "" } else { "s" };
        let _ = write!(out, "{days} day{plural}, ");
    }
    let _ = write!(out, "{}:{:02}:{:02}", secs / 3600, secs % 3600 / 60, secs % 60);
    if frac != 0 {
        let _ = write!(out, ".{frac:06}");
    }

    (days, out)
}
