//! OpenAI-backed [`ModelClient`] implementation. The only concrete
//! backend today; bridges the C4 contract (budgets, abstention, retry)
//! onto `atlas-model`'s bare REST client.

use crate::error::{AtlasError, Result};
use crate::model::{enforce_contract, Invocation, InvocationResult, ModelClient};
use async_trait::async_trait;
use atlas_model::{OpenAiClient, StructuredCompletionRequest};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Conservative default for OpenAI-compatible chat-completion endpoints.
/// Shared by every concurrent job through one `OpenAiModelClient`
/// instance — this is the admission gate spec.md §5 calls for, not a
/// per-request limit.
const DEFAULT_REQUESTS_PER_MINUTE: NonZeroU32 = nonzero!(500u32);

pub struct OpenAiModelClient {
    client: OpenAiClient,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl OpenAiModelClient {
    pub fn new(client: OpenAiClient) -> Self {
        Self::with_rate_limit(client, DEFAULT_REQUESTS_PER_MINUTE.get())
    }

    pub fn with_rate_limit(client: OpenAiClient, requests_per_minute: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(DEFAULT_REQUESTS_PER_MINUTE));
        Self { client, limiter: Arc::new(RateLimiter::direct(quota)) }
    }
}

#[async_trait]
impl ModelClient for OpenAiModelClient {
    async fn invoke(&self, invocation: Invocation) -> Result<InvocationResult> {
        self.limiter.until_ready().await;
        enforce_contract(&invocation, |inv| async move {
            let request = StructuredCompletionRequest::new(
                self.client.model(),
                inv.system_prompt.clone(),
                inv.user_prompt.clone(),
                inv.schema_name.clone(),
                inv.schema.clone(),
            )
            .with_seed(inv.seed)
            .with_max_tokens(inv.budget.max_output_tokens);

            let (response, duration) = self
                .client
                .structured_completion(request)
                .await
                .map_err(|e| AtlasError::Model(Box::new(e)))?;

            let (tokens_in, tokens_out) = response
                .usage
                .as_ref()
                .map(|u| (u.prompt_tokens, u.completion_tokens))
                .unwrap_or((0, 0));

            Ok((response.content, tokens_in, tokens_out, duration))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_an_openai_client() {
        let client = OpenAiClient::new("sk-test");
        let model_client = OpenAiModelClient::new(client);
        assert_eq!(model_client.client.model(), "gpt-4o");
    }

    #[tokio::test]
    async fn rate_limiter_admits_immediately_within_quota() {
        let client = OpenAiClient::new("sk-test");
        let model_client = OpenAiModelClient::with_rate_limit(client, 500);
        assert!(model_client.limiter.check().is_ok());
    }

    #[test]
    fn zero_requests_per_minute_falls_back_to_the_default() {
        let client = OpenAiClient::new("sk-test");
        let model_client = OpenAiModelClient::with_rate_limit(client, 0);
        assert!(model_client.limiter.check().is_ok());
    }
}
