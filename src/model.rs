//! Language model abstraction and the Gemini implementation.
//!
//! Defines the [`TextModel`] trait (one prompt in, free-form text out) and
//! [`GeminiModel`], which calls the Generative Language
//! `models/{name}:generateContent` REST endpoint.
//!
//! Rate limiting is not handled here; the [`Extractor`](crate::extract::Extractor)
//! owns the shared call quota so that every model call, whatever the
//! backend, passes through one limiter.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::ModelConfig;

/// A generative text model.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Model identifier used in logs (e.g. `"gemini-1.5-flash"`).
    fn model_name(&self) -> &str;

    /// Send one prompt and return the model's text response.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// [`TextModel`] backed by the Gemini `generateContent` API.
pub struct GeminiModel {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    /// Create a client from configuration and a caller-supplied API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty or the HTTP client cannot be
    /// built.
    pub fn new(config: &ModelConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("model API key must not be empty");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.name.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl TextModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = serde_json::json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Gemini API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .context("Failed to decode Gemini response")?;
        parse_gemini_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Gemini response has no candidate content"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.is_empty() {
        bail!("Gemini response contained no text");
    }
    Ok(text)
}
