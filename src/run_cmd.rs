//! `harvest run`: one pipeline invocation from the command line.
//!
//! The API key and the email source path are supplied by the caller; the
//! only fallbacks are the `model.api_key` / `source.path` config entries.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::model::GeminiModel;
use crate::pipeline::{Pipeline, RunReport};
use crate::sqlite_store::SqliteEventStore;

/// Pick the API key: explicit value first, then `model.api_key`.
pub fn resolve_api_key(explicit: Option<String>, config: &Config) -> Result<String> {
    match explicit.or_else(|| config.model.api_key.clone()) {
        Some(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("no model API key: pass --api-key, set GEMINI_API_KEY, or set model.api_key"),
    }
}

/// Pick the email source: explicit path first, then `source.path`.
pub fn resolve_source(explicit: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    match explicit.or_else(|| config.source.path.clone()) {
        Some(path) => Ok(path),
        None => bail!("no email source: pass --source or set source.path"),
    }
}

/// Open the database (creating the schema if needed) and assemble a
/// pipeline backed by SQLite and Gemini.
pub async fn build_pipeline(config: &Config, api_key: String) -> Result<(Arc<Pipeline>, SqlitePool)> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let store = Arc::new(SqliteEventStore::new(pool.clone()));
    let model = Arc::new(GeminiModel::new(&config.model, api_key)?);
    let pipeline = Pipeline::from_config(config, store, model)?;

    Ok((Arc::new(pipeline), pool))
}

pub async fn run_pipeline(
    config: &Config,
    source: Option<PathBuf>,
    api_key: Option<String>,
) -> Result<()> {
    let source = resolve_source(source, config)?;
    let api_key = resolve_api_key(api_key, config)?;
    let (pipeline, pool) = build_pipeline(config, api_key).await?;

    let handle = pipeline.spawn(source.clone());
    let report = handle.await??;
    print_report(&source, &report);

    pool.close().await;
    Ok(())
}

fn print_report(source: &std::path::Path, report: &RunReport) {
    println!("run {}", source.display());
    println!("  emails read: {}", report.emails);
    println!("  batches: {}", report.batches);
    println!("  events extracted: {}", report.candidates);
    println!("  events inserted: {}", report.inserted);
    println!("  expired removed: {}", report.sweep.expired);
    println!("  low-quality removed: {}", report.sweep.low_quality);
    println!("ok");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_key_wins() {
        let mut config = Config::minimal("x.sqlite");
        config.model.api_key = Some("from-config".to_string());
        assert_eq!(
            resolve_api_key(Some("from-cli".to_string()), &config).unwrap(),
            "from-cli"
        );
        assert_eq!(resolve_api_key(None, &config).unwrap(), "from-config");
    }

    #[test]
    fn test_missing_key_and_source_are_errors() {
        let config = Config::minimal("x.sqlite");
        assert!(resolve_api_key(None, &config).is_err());
        assert!(resolve_api_key(Some(" ".to_string()), &config).is_err());
        assert!(resolve_source(None, &config).is_err());
    }
}
