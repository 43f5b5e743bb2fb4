//! Event extraction from email batches.
//!
//! Each [`EmailBatch`] becomes exactly one model call: the batch text is
//! embedded in an instruction that pins down the output contract (a JSON
//! array of objects with `Date`, `Name`, `Time`, `Location`, `Description`,
//! `Price`), the call waits on the shared quota, and the response is parsed
//! into [`CandidateEvent`]s.
//!
//! Model output is untrusted. A failed call or an unparseable response is
//! logged and yields no candidates for that batch only; the rest of the run
//! carries on.
//!
//! # Response fencing
//!
//! Models usually wrap JSON in a Markdown code fence. [`strip_code_fence`]
//! locates the fenced region by its delimiters instead of slicing fixed
//! offsets, so surrounding prose, a missing language tag, or a trailing
//! newline do not corrupt the payload.

use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use event_harvester_core::batch::EmailBatch;
use event_harvester_core::models::CandidateEvent;

use crate::config::ModelConfig;
use crate::model::TextModel;

/// Code fence delimiter.
const FENCE: &str = "```";

/// Shared quota applied to every model call.
pub type CallLimiter = DefaultDirectRateLimiter;

/// Why a batch produced no candidates.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("model call failed: {0:#}")]
    Model(anyhow::Error),

    #[error("response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("expected a JSON array of events, got {0}")]
    NotAList(&'static str),
}

/// Build a limiter admitting at most `calls` in any `window`.
///
/// Calls are spaced one `window / calls` apart with no burst, so no span of
/// `window` ever sees more than `calls` admissions.
///
/// Returns `None` if `calls` is zero or the window is too short to divide.
pub fn call_limiter(calls: u32, window: Duration) -> Option<CallLimiter> {
    if calls == 0 {
        return None;
    }
    let quota = Quota::with_period(window / calls)?;
    Some(RateLimiter::direct(quota))
}

/// The instruction sent for one batch.
pub fn build_prompt(batch_text: &str) -> String {
    format!(
        "You help an events company pull event listings out of email. \
         Read the email content below and extract every event it describes. \
         Return a JSON array where each element is an object with exactly these fields: \
         \"Date\" (yyyy-mm-dd), \
         \"Name\", \
         \"Time\" (start time only, 24-hour clock with ':' between hours and minutes and no other characters, e.g. \"19:30\"), \
         \"Location\", \
         \"Description\" (be concise), \
         and \"Price\". \
         Return an array even when there is only one event. \
         Leave a field as an empty string when the email gives no information for it. \
         Email content: {}",
        batch_text
    )
}

/// Return the contents of the first fenced code block in `response`, or the
/// trimmed response when it is not fenced.
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };

    let after_open = &trimmed[open + FENCE.len()..];
    // Skip a language tag such as `json` on the opening line
    let body = match after_open.split_once('\n') {
        Some((tag, rest))
            if tag
                .trim()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
        {
            rest
        }
        _ => after_open,
    };

    let body = match body.rfind(FENCE) {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim()
}

/// Parse a model response into candidate events.
///
/// Array elements that are not JSON objects, or that do not deserialize as
/// an event, are skipped with a warning.
pub fn parse_candidates(response: &str) -> Result<Vec<CandidateEvent>, ExtractError> {
    let value: Value = serde_json::from_str(strip_code_fence(response))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => return Err(ExtractError::NotAList("an object")),
        Value::String(_) => return Err(ExtractError::NotAList("a string")),
        Value::Number(_) => return Err(ExtractError::NotAList("a number")),
        Value::Bool(_) => return Err(ExtractError::NotAList("a boolean")),
        Value::Null => return Err(ExtractError::NotAList("null")),
    };

    let mut candidates = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            warn!(index = i, "Skipping non-object element in model response");
            continue;
        }
        match serde_json::from_value(item) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => warn!(index = i, "Skipping malformed event in model response: {}", e),
        }
    }
    Ok(candidates)
}

/// Turns email batches into candidate events through a rate-limited model.
///
/// Clone the `Arc`s, not the limiter: every extractor sharing a limiter
/// shares its quota.
#[derive(Clone)]
pub struct Extractor {
    model: Arc<dyn TextModel>,
    limiter: Arc<CallLimiter>,
}

impl Extractor {
    pub fn new(model: Arc<dyn TextModel>, limiter: Arc<CallLimiter>) -> Self {
        Self { model, limiter }
    }

    /// Build an extractor with a fresh limiter sized from `config`.
    pub fn from_config(model: Arc<dyn TextModel>, config: &ModelConfig) -> anyhow::Result<Self> {
        let limiter = call_limiter(
            config.calls_per_window,
            Duration::from_secs(config.window_secs),
        )
        .ok_or_else(|| anyhow::anyhow!("invalid model call quota"))?;
        Ok(Self::new(model, Arc::new(limiter)))
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// One model call for `batch`, with the failure cause preserved.
    ///
    /// Waits for quota before calling; the wait has no timeout.
    pub async fn try_extract(
        &self,
        batch: &EmailBatch<'_>,
    ) -> Result<Vec<CandidateEvent>, ExtractError> {
        let prompt = build_prompt(&batch.text());

        self.limiter.until_ready().await;
        let response = self
            .model
            .generate(&prompt)
            .await
            .map_err(ExtractError::Model)?;
        debug!(batch = batch.number, response = %response, "Model response");

        parse_candidates(&response).inspect_err(|_| {
            warn!(batch = batch.number, response = %response, "Unparseable model response");
        })
    }

    /// Like [`try_extract`](Self::try_extract), but logs failures and
    /// returns an empty list instead.
    pub async fn extract(&self, batch: &EmailBatch<'_>) -> Vec<CandidateEvent> {
        match self.try_extract(batch).await {
            Ok(candidates) => {
                info!(
                    batch = batch.number,
                    emails = batch.len(),
                    events = candidates.len(),
                    "Extracted events from batch"
                );
                candidates
            }
            Err(e) => {
                error!(batch = batch.number, "Batch extraction failed: {}", e);
                Vec::new()
            }
        }
    }
}
