//! Standalone sweep command.

use anyhow::Result;
use chrono::Local;

use event_harvester_core::reconcile::Reconciler;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteEventStore;

/// `harvest sweep`: remove expired and low-quality events without
/// extracting anything.
pub async fn run_sweep(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteEventStore::new(pool.clone());

    let report = Reconciler::new(&store)
        .sweep(Local::now().naive_local())
        .await?;

    println!("sweep");
    println!("  expired removed: {}", report.expired);
    println!("  low-quality removed: {}", report.low_quality);
    println!("ok");

    pool.close().await;
    Ok(())
}
