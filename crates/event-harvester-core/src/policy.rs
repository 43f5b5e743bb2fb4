//! Row retention rules applied by the sweep.
//!
//! Both predicates operate on the stored text columns so that every store
//! backend agrees with the SQL the SQLite store runs: dates and times are
//! compared as strings (`YYYY-MM-DD`, `HH:MM`), which orders correctly for
//! well-formed values and never matches sentinel text.

use chrono::{NaiveDate, NaiveTime};

use crate::models::{EventRow, LOCATION_UNAVAILABLE, NOT_AVAILABLE};

/// Format used for the `date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format used for the `time` column.
pub const TIME_FORMAT: &str = "%H:%M";

/// Minimum number of sentinel fields (among name, location, time,
/// description) that marks a row as low quality.
pub const LOW_QUALITY_THRESHOLD: usize = 2;

/// The reference instant for expiry, pre-formatted as column text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cutoff {
    pub today: String,
    pub now: String,
}

impl Cutoff {
    pub fn new(today: NaiveDate, now: NaiveTime) -> Self {
        Self {
            today: today.format(DATE_FORMAT).to_string(),
            now: now.format(TIME_FORMAT).to_string(),
        }
    }
}

/// `true` when the row's date is before today, or is today and its time is
/// before now.
pub fn is_expired(row: &EventRow, cutoff: &Cutoff) -> bool {
    row.date.as_str() < cutoff.today.as_str()
        || (row.date == cutoff.today && row.time.as_str() < cutoff.now.as_str())
}

/// Number of placeholder values among name, location, time, and description.
pub fn sentinel_count(row: &EventRow) -> usize {
    [
        row.name == NOT_AVAILABLE,
        row.location == LOCATION_UNAVAILABLE,
        row.time == NOT_AVAILABLE,
        row.description == NOT_AVAILABLE,
    ]
    .iter()
    .filter(|hit| **hit)
    .count()
}

/// `true` when the row is too incomplete to keep.
pub fn is_low_quality(row: &EventRow) -> bool {
    row.date == NOT_AVAILABLE || sentinel_count(row) >= LOW_QUALITY_THRESHOLD
}
