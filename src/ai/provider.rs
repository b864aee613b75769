use async_trait::async_trait;
use log::warn;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::models::ProviderTier;

/// One AI completion endpoint in the fallback chain. Modeled
/// as an explicit trait so the orchestrator's tier loop is a plain ordered
/// iteration, not runtime type dispatch (Design Notes, "explicit dispatch").
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn tier(&self) -> ProviderTier;

    /// A single attempt, no internal retries — `max_retries = 0` is
    /// enforced by never looping here; the orchestrator advances to the
    /// next tier on any error.
    async fn complete(&self, prompt: &str, json_mode: bool, max_tokens: u32) -> Result<String, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// Thin `reqwest`-based client, one per tier, following the shape of the
/// teacher's `services/gemini.rs` (`reqwest::Client::new().post(url)
/// .json(...).send().await?.json::<T>().await?`) generalized across three
/// distinct endpoints.
pub struct HttpAiProvider {
    tier: ProviderTier,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpAiProvider {
    pub fn new(tier: ProviderTier, base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            tier,
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl AiProvider for HttpAiProvider {
    fn tier(&self) -> ProviderTier {
        self.tier
    }

    async fn complete(&self, prompt: &str, json_mode: bool, max_tokens: u32) -> Result<String, PipelineError> {
        let response = self
            .client
            .post(format!("{}/v1/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "response_format": if json_mode { "json_object" } else { "text" },
                "max_tokens": max_tokens.min(8000),
            }))
            .send()
            .await
            .map_err(|e| PipelineError::ProviderQuotaExceeded(format!("{}: transport error: {e}", self.tier)))?;

        match response.status() {
            status if status.is_success() => {
                let body: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| PipelineError::ProviderQuotaExceeded(format!("{}: malformed response: {e}", self.tier)))?;
                Ok(body.text)
            }
            status if status.as_u16() == 429 => {
                warn!("{}: quota exceeded (429)", self.tier);
                Err(PipelineError::ProviderQuotaExceeded(format!("{} returned 429", self.tier)))
            }
            status => {
                warn!("{}: request failed with status {status}", self.tier);
                Err(PipelineError::ProviderQuotaExceeded(format!("{} returned {status}", self.tier)))
            }
        }
    }
}
