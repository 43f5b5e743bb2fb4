//! In-memory [`EventStore`] implementation for tests and embedding.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`. Sweep predicates are the
//! ones from [`crate::policy`], so behavior matches the SQLite store.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rand::seq::SliceRandom;

use crate::models::{EventRow, StoredEvent};
use crate::policy::{is_expired, is_low_quality, Cutoff};

use super::{group_by_name, EventStore};

struct Table {
    next_id: i64,
    rows: Vec<StoredEvent>,
}

/// In-memory event table.
pub struct InMemoryEventStore {
    table: RwLock<Table>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                next_id: 1,
                rows: Vec::new(),
            }),
        }
    }

    fn remove_where(&self, pred: impl Fn(&EventRow) -> bool) -> Result<u64> {
        let mut table = self.table.write().map_err(|_| anyhow!("event table lock poisoned"))?;
        let before = table.rows.len();
        table.rows.retain(|stored| !pred(&stored.row));
        Ok((before - table.rows.len()) as u64)
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn query(&self, date: &str) -> Result<Vec<EventRow>> {
        let table = self.table.read().map_err(|_| anyhow!("event table lock poisoned"))?;
        Ok(group_by_name(
            table
                .rows
                .iter()
                .map(|stored| &stored.row)
                .filter(|row| row.date == date),
        ))
    }

    async fn insert(&self, row: &EventRow) -> Result<()> {
        let mut table = self.table.write().map_err(|_| anyhow!("event table lock poisoned"))?;
        let id = table.next_id;
        table.next_id += 1;
        table.rows.push(StoredEvent {
            id,
            row: row.clone(),
        });
        Ok(())
    }

    async fn delete_expired(&self, today: NaiveDate, now: NaiveTime) -> Result<u64> {
        let cutoff = Cutoff::new(today, now);
        self.remove_where(|row| is_expired(row, &cutoff))
    }

    async fn delete_low_quality(&self) -> Result<u64> {
        self.remove_where(is_low_quality)
    }

    async fn all(&self) -> Result<Vec<StoredEvent>> {
        let table = self.table.read().map_err(|_| anyhow!("event table lock poisoned"))?;
        Ok(table.rows.clone())
    }

    async fn random(&self) -> Result<Option<EventRow>> {
        let table = self.table.read().map_err(|_| anyhow!("event table lock poisoned"))?;
        Ok(table
            .rows
            .choose(&mut rand::thread_rng())
            .map(|stored| stored.row.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NOT_AVAILABLE;

    fn event(name: &str, date: &str, time: &str) -> EventRow {
        EventRow {
            name: name.to_string(),
            price: "Free".to_string(),
            location: "Science Center".to_string(),
            date: date.to_string(),
            time: time.to_string(),
            description: "Talk".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_keeps_duplicates() {
        let store = InMemoryEventStore::new();
        let e = event("Lecture", "2025-06-12", "16:00");
        store.insert(&e).await.unwrap();
        store.insert(&e).await.unwrap();
        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_ne!(all[0].id, all[1].id);
        assert_eq!(store.query("2025-06-12").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_query_filters_by_date() {
        let store = InMemoryEventStore::new();
        store.insert(&event("A", "2025-06-12", "10:00")).await.unwrap();
        store.insert(&event("B", "2025-06-13", "10:00")).await.unwrap();
        let rows = store.query("2025-06-13").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "B");
    }

    #[tokio::test]
    async fn test_delete_expired_counts_removed_rows() {
        let store = InMemoryEventStore::new();
        store.insert(&event("Past", "2025-06-09", "12:00")).await.unwrap();
        store.insert(&event("Earlier", "2025-06-10", "09:59")).await.unwrap();
        store.insert(&event("Later", "2025-06-10", "10:01")).await.unwrap();
        store.insert(&event("Tomorrow", "2025-06-11", "08:00")).await.unwrap();

        let removed = store
            .delete_expired(
                NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let names: Vec<String> = store
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.row.name)
            .collect();
        assert_eq!(names, vec!["Later", "Tomorrow"]);
    }

    #[tokio::test]
    async fn test_delete_low_quality() {
        let store = InMemoryEventStore::new();
        let mut bad = event(NOT_AVAILABLE, "2025-06-12", NOT_AVAILABLE);
        bad.description = "something".to_string();
        store.insert(&bad).await.unwrap();
        store.insert(&event("Good", "2025-06-12", "10:00")).await.unwrap();

        assert_eq!(store.delete_low_quality().await.unwrap(), 1);
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_random_picks_a_stored_row() {
        let store = InMemoryEventStore::new();
        assert!(store.random().await.unwrap().is_none());

        store.insert(&event("A", "2025-06-12", "10:00")).await.unwrap();
        store.insert(&event("B", "2025-06-13", "11:00")).await.unwrap();
        for _ in 0..10 {
            let picked = store.random().await.unwrap().unwrap();
            assert!(picked.name == "A" || picked.name == "B");
        }
    }
}
