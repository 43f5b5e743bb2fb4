//! Pipeline orchestration.
//!
//! Coordinates one invocation: read source → batch → extract (rate
//! limited, sequential) → normalize → insert → sweep.
//!
//! Failures are absorbed at the smallest scope that can absorb them:
//!
//! | Failure | Effect |
//! |---------|--------|
//! | source unreadable | logged; run continues with zero emails and still sweeps |
//! | model call / response parse | logged; that batch contributes nothing |
//! | store write or delete | logged and returned as [`PipelineError::StoreWrite`] |
//!
//! Inserts are not rolled back when a later write fails.
//!
//! Invocations on the same [`Pipeline`] are serialized by an internal
//! mutex, so overlapping triggers cannot interleave their inserts and
//! sweeps. Logs go to the subscriber injected with
//! [`Pipeline::with_dispatch`], or to the caller's current subscriber.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{error, info, info_span, warn, Dispatch, Instrument};

use event_harvester_core::batch::Batcher;
use event_harvester_core::normalize::normalize;
use event_harvester_core::reconcile::{Reconciler, SweepReport};
use event_harvester_core::store::EventStore;

use crate::config::Config;
use crate::extract::Extractor;
use crate::model::TextModel;

/// Failure of a pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read email source {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("event store write failed: {0:#}")]
    StoreWrite(anyhow::Error),
}

/// Counts from one completed invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub emails: usize,
    pub batches: usize,
    pub candidates: usize,
    pub inserted: usize,
    pub sweep: SweepReport,
}

/// Read the raw corpus. Non-UTF-8 content is reported as a read failure.
pub async fn read_source(path: &Path) -> Result<String, PipelineError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PipelineError::SourceRead {
            path: path.to_path_buf(),
            source,
        })
}

/// The extraction and reconciliation pipeline.
pub struct Pipeline {
    store: Arc<dyn EventStore>,
    extractor: Extractor,
    batcher: Batcher,
    run_lock: Mutex<()>,
    dispatch: Option<Dispatch>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn EventStore>, extractor: Extractor, batcher: Batcher) -> Self {
        Self {
            store,
            extractor,
            batcher,
            run_lock: Mutex::new(()),
            dispatch: None,
        }
    }

    /// Build a pipeline with batching and quota taken from `config`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn EventStore>,
        model: Arc<dyn TextModel>,
    ) -> anyhow::Result<Self> {
        let extractor = Extractor::from_config(model, &config.model)?;
        let batcher = Batcher::new(
            config.source.separator.clone(),
            config.source.max_emails,
            config.source.batch_size,
        );
        Ok(Self::new(store, extractor, batcher))
    }

    /// Send this pipeline's logs to `dispatch` instead of the ambient
    /// subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Launch a run on a background task.
    ///
    /// The handle may be dropped for fire-and-forget use, or awaited to
    /// observe the outcome.
    pub fn spawn(self: &Arc<Self>, source: PathBuf) -> JoinHandle<Result<RunReport, PipelineError>> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.run(&source).await }.with_current_subscriber())
    }

    /// Run against the email file at `source`, sweeping relative to the
    /// local wall clock.
    pub async fn run(&self, source: &Path) -> Result<RunReport, PipelineError> {
        self.run_at(source, Local::now().naive_local()).await
    }

    /// Run against `source`, sweeping relative to `now`.
    pub async fn run_at(
        &self,
        source: &Path,
        now: NaiveDateTime,
    ) -> Result<RunReport, PipelineError> {
        let span = info_span!("pipeline", source = %source.display());
        self.in_sink(
            async {
                let raw = match read_source(source).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        error!("{}", e);
                        String::new()
                    }
                };
                self.process(&raw, now).await
            }
            .instrument(span),
        )
        .await
    }

    /// Run against an in-memory corpus, sweeping relative to `now`.
    pub async fn run_text_at(
        &self,
        raw: &str,
        now: NaiveDateTime,
    ) -> Result<RunReport, PipelineError> {
        self.in_sink(self.process(raw, now).instrument(info_span!("pipeline")))
            .await
    }

    /// Only the sweep step, under the same run lock.
    pub async fn sweep_at(&self, now: NaiveDateTime) -> Result<SweepReport, PipelineError> {
        self.in_sink(async {
            let _guard = self.run_lock.lock().await;
            Reconciler::new(self.store.as_ref())
                .sweep(now)
                .await
                .map_err(PipelineError::StoreWrite)
        })
        .await
    }

    async fn in_sink<F: Future>(&self, fut: F) -> F::Output {
        match &self.dispatch {
            Some(dispatch) => fut.with_subscriber(dispatch.clone()).await,
            None => fut.await,
        }
    }

    async fn process(&self, raw: &str, now: NaiveDateTime) -> Result<RunReport, PipelineError> {
        let _guard = self.run_lock.lock().await;

        let emails = self.batcher.emails(raw).count();
        info!(
            emails,
            model = self.extractor.model_name(),
            "Processing emails"
        );

        let mut report = RunReport {
            emails,
            ..Default::default()
        };
        let mut events = Vec::new();

        // Sequential: every call draws from the one quota
        for batch in self.batcher.batches(raw) {
            report.batches += 1;
            let candidates = self.extractor.extract(&batch).await;
            report.candidates += candidates.len();
            events.extend(candidates.iter().map(normalize));
        }

        if events.is_empty() {
            warn!("No events extracted");
        }

        let reconciler = Reconciler::new(self.store.as_ref());
        report.inserted = reconciler
            .insert_all(&events)
            .await
            .map_err(PipelineError::StoreWrite)?;
        report.sweep = reconciler
            .sweep(now)
            .await
            .map_err(PipelineError::StoreWrite)?;

        info!(
            emails = report.emails,
            batches = report.batches,
            inserted = report.inserted,
            removed = report.sweep.total(),
            "Pipeline run complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::call_limiter;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime};
    use event_harvester_core::batch::SEPARATOR;
    use event_harvester_core::store::memory::InMemoryEventStore;
    use std::time::Duration;

    /// Answers each prompt by looking for a marker in the batch text.
    struct MarkerModel;

    #[async_trait]
    impl TextModel for MarkerModel {
        fn model_name(&self) -> &str {
            "marker"
        }

        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            if prompt.contains("BROKEN") {
                return Ok("Sorry, I can't help with that.".to_string());
            }
            if prompt.contains("OUTAGE") {
                anyhow::bail!("connection reset");
            }
            let names: Vec<&str> = prompt
                .split_whitespace()
                .filter(|w| w.starts_with("event-"))
                .collect();
            let events: Vec<serde_json::Value> = names
                .iter()
                .map(|n| {
                    serde_json::json!({
                        "Date": "2025-06-20",
                        "Name": n,
                        "Time": "1800",
                        "Location": "Quad",
                        "Description": "Outdoor",
                        "Price": "Free"
                    })
                })
                .collect();
            Ok(format!(
                "```json\n{}\n```",
                serde_json::to_string(&events).unwrap()
            ))
        }
    }

    fn pipeline(store: Arc<InMemoryEventStore>) -> Pipeline {
        let limiter = call_limiter(1000, Duration::from_secs(1)).unwrap();
        let extractor = Extractor::new(Arc::new(MarkerModel), Arc::new(limiter));
        Pipeline::new(store, extractor, Batcher::default())
    }

    fn now() -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2025, 6, 10).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        )
    }

    fn corpus(emails: &[&str]) -> String {
        emails.join(&format!("\n{}\n", SEPARATOR))
    }

    #[tokio::test]
    async fn test_bad_batch_does_not_affect_others() {
        let store = Arc::new(InMemoryEventStore::new());
        let raw = corpus(&[
            "event-a", "event-b", "event-c", // batch 1
            "BROKEN", "event-x", "event-y", // batch 2
            "event-d", "event-e", // batch 3
        ]);

        let report = pipeline(store.clone()).run_text_at(&raw, now()).await.unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.inserted, 5);
        let names: Vec<String> = store
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.row.name)
            .collect();
        assert_eq!(names, vec!["event-a", "event-b", "event-c", "event-d", "event-e"]);
    }

    #[tokio::test]
    async fn test_model_outage_isolated_to_batch() {
        let store = Arc::new(InMemoryEventStore::new());
        let raw = corpus(&["event-a", "OUTAGE", "event-b", "event-c"]);
        let report = pipeline(store.clone()).run_text_at(&raw, now()).await.unwrap();
        assert_eq!(report.batches, 2);
        assert_eq!(report.inserted, 1);
    }

    #[tokio::test]
    async fn test_times_are_repaired_before_insert() {
        let store = Arc::new(InMemoryEventStore::new());
        pipeline(store.clone())
            .run_text_at("event-solo", now())
            .await
            .unwrap();
        let rows = store.query("2025-06-20").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].time, "18:00");
    }

    #[tokio::test]
    async fn test_missing_source_still_sweeps() {
        let store = Arc::new(InMemoryEventStore::new());
        store
            .insert(&event_harvester_core::models::EventRow {
                name: "Stale".to_string(),
                price: "Free".to_string(),
                location: "Hall".to_string(),
                date: "2020-01-01".to_string(),
                time: "12:00".to_string(),
                description: "Old".to_string(),
            })
            .await
            .unwrap();

        let report = pipeline(store.clone())
            .run_at(Path::new("/nonexistent/emails.txt"), now())
            .await
            .unwrap();

        assert_eq!(report.emails, 0);
        assert_eq!(report.sweep.expired, 1);
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_handle_can_be_awaited() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("emails.txt");
        std::fs::write(&source, corpus(&["event-future"])).unwrap();

        let store = Arc::new(InMemoryEventStore::new());
        let pipeline = Arc::new(pipeline(store.clone()));
        let report = pipeline.spawn(source).await.unwrap().unwrap();

        assert_eq!(report.emails, 1);
        assert_eq!(report.candidates, 1);
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_serialized() {
        let store = Arc::new(InMemoryEventStore::new());
        let pipeline = Arc::new(pipeline(store.clone()));
        let raw = corpus(&["event-a", "event-b"]);

        let (first, second) = tokio::join!(
            pipeline.run_text_at(&raw, now()),
            pipeline.run_text_at(&raw, now())
        );
        assert_eq!(first.unwrap().inserted, 2);
        assert_eq!(second.unwrap().inserted, 2);
        assert_eq!(store.all().await.unwrap().len(), 4);
    }

    #[test]
    fn test_source_error_names_path() {
        let err = PipelineError::SourceRead {
            path: PathBuf::from("emails.txt"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("emails.txt"));
    }
}
