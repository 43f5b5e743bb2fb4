//! Store reconciliation: insert this run's events, then sweep.
//!
//! The two steps run once per pipeline invocation, inserts first. There is
//! no transaction around them; a failure part-way leaves earlier inserts in
//! place and is reported to the caller.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{error, info};

use crate::models::CanonicalEvent;
use crate::store::EventStore;

/// Rows removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: u64,
    pub low_quality: u64,
}

impl SweepReport {
    pub fn total(&self) -> u64 {
        self.expired + self.low_quality
    }
}

/// Applies canonical events and retention rules to an [`EventStore`].
pub struct Reconciler<'a> {
    store: &'a dyn EventStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn EventStore) -> Self {
        Self { store }
    }

    /// Append one row per event. Stops at the first failed write.
    pub async fn insert_all(&self, events: &[CanonicalEvent]) -> Result<usize> {
        for (i, event) in events.iter().enumerate() {
            let row = event.to_row();
            if let Err(e) = self.store.insert(&row).await {
                error!(
                    inserted = i,
                    name = %row.name,
                    "Failed to insert event: {:#}",
                    e
                );
                return Err(e).with_context(|| format!("inserting event '{}'", row.name));
            }
        }
        info!(count = events.len(), "Inserted events");
        Ok(events.len())
    }

    /// Remove expired and low-quality rows relative to `now`.
    pub async fn sweep(&self, now: NaiveDateTime) -> Result<SweepReport> {
        let expired = self
            .store
            .delete_expired(now.date(), now.time())
            .await
            .inspect_err(|e| error!("Failed to delete expired events: {:#}", e))
            .context("deleting expired events")?;
        let low_quality = self
            .store
            .delete_low_quality()
            .await
            .inspect_err(|e| error!("Failed to delete low-quality events: {:#}", e))
            .context("deleting low-quality events")?;

        let report = SweepReport {
            expired,
            low_quality,
        };
        info!(
            expired = report.expired,
            low_quality = report.low_quality,
            "Swept stale events"
        );
        Ok(report)
    }
}
