//! SQLite-backed [`EventStore`] implementation.
//!
//! Translates each store operation into a single SQL statement against the
//! `events` table created by [`crate::migrate`]. The retention predicates
//! mirror [`event_harvester_core::policy`] so both backends agree.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use event_harvester_core::models::{EventRow, StoredEvent, LOCATION_UNAVAILABLE, NOT_AVAILABLE};
use event_harvester_core::policy::{Cutoff, LOW_QUALITY_THRESHOLD};
use event_harvester_core::store::EventStore;

/// SQLite implementation of the [`EventStore`] trait.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_event(row: &SqliteRow) -> EventRow {
    EventRow {
        name: row.get("name"),
        price: row.get("price"),
        location: row.get("location"),
        date: row.get("date"),
        time: row.get("time"),
        description: row.get("description"),
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn query(&self, date: &str) -> Result<Vec<EventRow>> {
        let rows = sqlx::query(
            r#"
            SELECT name,
                   MAX(price) AS price,
                   MIN(location) AS location,
                   MIN(date) AS date,
                   MIN(time) AS time,
                   MIN(description) AS description
            FROM events
            WHERE date = ?
            GROUP BY name
            ORDER BY time, name
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_event).collect())
    }

    async fn insert(&self, row: &EventRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (date, name, time, location, description, price)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.date)
        .bind(&row.name)
        .bind(&row.time)
        .bind(&row.location)
        .bind(&row.description)
        .bind(&row.price)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_expired(&self, today: NaiveDate, now: NaiveTime) -> Result<u64> {
        let cutoff = Cutoff::new(today, now);
        let result = sqlx::query(
            r#"
            DELETE FROM events
            WHERE date < ?
               OR (date = ? AND time < ?)
            "#,
        )
        .bind(&cutoff.today)
        .bind(&cutoff.today)
        .bind(&cutoff.now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_low_quality(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM events
            WHERE ((name = ?)
                 + (location = ?)
                 + (time = ?)
                 + (description = ?)) >= ?
               OR date = ?
            "#,
        )
        .bind(NOT_AVAILABLE)
        .bind(LOCATION_UNAVAILABLE)
        .bind(NOT_AVAILABLE)
        .bind(NOT_AVAILABLE)
        .bind(LOW_QUALITY_THRESHOLD as i64)
        .bind(NOT_AVAILABLE)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn all(&self) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query(
            "SELECT id, name, price, location, date, time, description FROM events ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| StoredEvent {
                id: row.get("id"),
                row: row_to_event(row),
            })
            .collect())
    }

    async fn random(&self) -> Result<Option<EventRow>> {
        let row = sqlx::query(
            "SELECT name, price, location, date, time, description FROM events ORDER BY RANDOM() LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_event))
    }
}
