//! Storage abstraction for Event Harvester.
//!
//! The [`EventStore`] trait is the minimal query interface the pipeline and
//! the read surfaces need. Rows carry no uniqueness key: duplicates are
//! allowed to accumulate and are collapsed by [`EventStore::query`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::models::{EventRow, StoredEvent};

/// Abstract event table.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`query`](EventStore::query) | Events on one date, grouped by name |
/// | [`insert`](EventStore::insert) | Append one row |
/// | [`delete_expired`](EventStore::delete_expired) | Remove rows before the cutoff |
/// | [`delete_low_quality`](EventStore::delete_low_quality) | Remove incomplete rows |
/// | [`all`](EventStore::all) | Every stored row, in insertion order |
/// | [`random`](EventStore::random) | One row picked uniformly at random |
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events whose date column equals `date`, one per distinct name.
    ///
    /// Duplicate names collapse with `MAX(price)`, `MIN(location)`,
    /// `MIN(date)`, `MIN(time)`, `MIN(description)`. Results are ordered by
    /// the collapsed time, then name.
    async fn query(&self, date: &str) -> Result<Vec<EventRow>>;

    /// Append a row. No deduplication is performed.
    async fn insert(&self, row: &EventRow) -> Result<()>;

    /// Delete rows expired relative to `today` / `now`. Returns rows removed.
    async fn delete_expired(&self, today: NaiveDate, now: NaiveTime) -> Result<u64>;

    /// Delete low-quality rows. Returns rows removed.
    async fn delete_low_quality(&self) -> Result<u64>;

    /// Every stored row.
    async fn all(&self) -> Result<Vec<StoredEvent>>;

    /// Any one stored row, or `None` when the table is empty. Duplicates
    /// are not collapsed, so repeated events are proportionally likelier.
    async fn random(&self) -> Result<Option<EventRow>>;
}

/// Collapse rows sharing a name using the documented aggregate tie-breaks.
///
/// Shared by backends that cannot push the grouping down to SQL.
pub fn group_by_name<'a>(rows: impl IntoIterator<Item = &'a EventRow>) -> Vec<EventRow> {
    let mut groups: std::collections::BTreeMap<&str, EventRow> = std::collections::BTreeMap::new();
    for row in rows {
        match groups.get_mut(row.name.as_str()) {
            Some(acc) => {
                keep_max(&mut acc.price, &row.price);
                keep_min(&mut acc.location, &row.location);
                keep_min(&mut acc.date, &row.date);
                keep_min(&mut acc.time, &row.time);
                keep_min(&mut acc.description, &row.description);
            }
            None => {
                groups.insert(row.name.as_str(), row.clone());
            }
        }
    }

    let mut out: Vec<EventRow> = groups.into_values().collect();
    out.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.name.cmp(&b.name)));
    out
}

fn keep_max(acc: &mut String, candidate: &str) {
    if candidate > acc.as_str() {
        *acc = candidate.to_string();
    }
}

fn keep_min(acc: &mut String, candidate: &str) {
    if candidate < acc.as_str() {
        *acc = candidate.to_string();
    }
}
