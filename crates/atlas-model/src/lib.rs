//! Pure REST client for OpenAI-compatible chat completions.
//!
//! Knows nothing about extraction, contracts, or anchors — it only knows
//! how to send a structured-output chat completion request and hand back
//! the raw JSON content and token usage. Domain semantics (budgets,
//! abstention, retries) live one layer up, in `atlas-core`'s model client.
//!
//! # Example
//!
//! ```rust,ignore
//! use atlas_model::{OpenAiClient, StructuredCompletionRequest};
//!
//! let client = OpenAiClient::from_env()?;
//! let request = StructuredCompletionRequest::new(
//!     client.model(),
//!     "You are a structured data extractor.",
//!     "Extract the title from: ...",
//!     "extraction_result",
//!     schema,
//! );
//! let response = client.structured_completion(request).await?;
//! ```

pub mod error;
pub mod schema;
pub mod types;

pub use error::{ModelError, Result};
pub use schema::ensure_no_additional_properties;
pub use types::*;

use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// OpenAI-compatible REST client (works against OpenAI itself, Azure
/// OpenAI, or any provider implementing the same chat-completions wire
/// format).
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    /// Create a client with the given API key and default model/base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from `OPENAI_API_KEY`, optionally overridden by
    /// `OPENAI_BASE_URL` and `OPENAI_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ModelError::Config("OPENAI_API_KEY not set".into()))?;
        let mut client = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            client = client.with_base_url(base_url);
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            client = client.with_model(model);
        }
        Ok(client)
    }

    /// Set a custom base URL (for Azure, proxies, local providers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model used when a caller doesn't override it.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a structured-output completion request and return the raw
    /// JSON content plus usage and wall-clock duration.
    pub async fn structured_completion(
        &self,
        request: StructuredCompletionRequest,
    ) -> Result<(StructuredCompletionResponse, Duration)> {
        let start = Instant::now();

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "model request failed");
                ModelError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "model API error");
            return Err(ModelError::Api { status: status.as_u16(), body });
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| ModelError::Parse(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ModelError::Api { status: status.as_u16(), body: "no choices in response".into() })?;

        let duration = start.elapsed();
        debug!(model = %request.model, duration_ms = duration.as_millis(), "structured completion");

        Ok((StructuredCompletionResponse { content, usage: raw.usage }, duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_key_base_url_and_model() {
        let client = OpenAiClient::new("sk-test")
            .with_base_url("https://custom.api.com")
            .with_model("gpt-4o-mini");

        assert_eq!(client.api_key(), "sk-test");
        assert_eq!(client.base_url(), "https://custom.api.com");
        assert_eq!(client.model(), "gpt-4o-mini");
    }

    #[test]
    fn defaults_are_openai_compatible() {
        let client = OpenAiClient::new("sk-test");
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
        assert_eq!(client.model(), DEFAULT_MODEL);
    }
}
