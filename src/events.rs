//! Read-side event listings for the CLI and HTTP API.
//!
//! Both surfaces show the grouped view from [`EventStore::query`]: one entry
//! per event name per day, with duplicates collapsed.

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use serde::Serialize;

use event_harvester_core::models::EventRow;
use event_harvester_core::policy::DATE_FORMAT;
use event_harvester_core::store::EventStore;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteEventStore;

/// Days covered by the week view, starting today.
pub const WEEK_DAYS: u64 = 7;

/// Grouped events for one calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct DayEvents {
    /// e.g. `"Monday"`.
    pub weekday: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// e.g. `"June 09, 2025"`.
    pub label: String,
    pub events: Vec<EventRow>,
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("invalid date '{}': expected YYYY-MM-DD", s))
}

pub async fn day_events(store: &dyn EventStore, date: NaiveDate) -> Result<DayEvents> {
    let key = date.format(DATE_FORMAT).to_string();
    let events = store.query(&key).await?;
    Ok(DayEvents {
        weekday: date.format("%A").to_string(),
        date: key,
        label: date.format("%B %d, %Y").to_string(),
        events,
    })
}

/// Seven consecutive days of events starting at `start`.
pub async fn week_events(store: &dyn EventStore, start: NaiveDate) -> Result<Vec<DayEvents>> {
    let mut days = Vec::with_capacity(WEEK_DAYS as usize);
    for offset in 0..WEEK_DAYS {
        let date = start
            .checked_add_days(Days::new(offset))
            .context("date out of range")?;
        days.push(day_events(store, date).await?);
    }
    Ok(days)
}

fn print_day(day: &DayEvents) {
    println!("{}, {}", day.weekday, day.label);
    if day.events.is_empty() {
        println!("  (no events)");
        return;
    }
    for e in &day.events {
        println!("  {}  {}", e.time, e.name);
        println!("      where: {}", e.location);
        println!("      price: {}", e.price);
        println!("      {}", e.description);
    }
}

/// `harvest events [--date]`.
pub async fn run_events(config: &Config, date: Option<String>) -> Result<()> {
    let date = match date {
        Some(s) => parse_date(&s)?,
        None => Local::now().date_naive(),
    };
    let pool = db::connect(config).await?;
    let store = SqliteEventStore::new(pool.clone());

    let day = day_events(&store, date).await?;
    print_day(&day);

    pool.close().await;
    Ok(())
}

/// `harvest random`.
pub async fn run_random(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteEventStore::new(pool.clone());

    match store.random().await? {
        Some(e) => {
            println!("{}  {}  {}", e.date, e.time, e.name);
            println!("    where: {}", e.location);
            println!("    price: {}", e.price);
            println!("    {}", e.description);
        }
        None => println!("(no events)"),
    }

    pool.close().await;
    Ok(())
}

/// `harvest week`.
pub async fn run_week(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteEventStore::new(pool.clone());

    for day in week_events(&store, Local::now().date_naive()).await? {
        print_day(&day);
        println!();
    }

    pool.close().await;
    Ok(())
}
