//! The `static_fetch` content acquisition strategy (C9): a plain HTTP GET
//! validated against SSRF rules before the request is ever issued.

use atlas_core::types::{AcquisitionMetadata, AttemptOutcome};
use atlas_core::{AtlasError, FetchOptions, FetchOutcome, Result, Strategy, StrategyKind, UrlValidator};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub struct StaticFetchStrategy {
    client: Client,
    validator: UrlValidator,
}

impl StaticFetchStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .user_agent("atlas-codex/0.1")
                .build()
                .unwrap_or_default(),
            validator: UrlValidator::new(),
        }
    }
}

#[async_trait]
impl Strategy for StaticFetchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StaticFetch
    }

    async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<FetchOutcome> {
        self.validator.validate_with_dns(url).await?;

        let response = self.client.get(url).send().await.map_err(|e| attempt_failed(AttemptOutcome::Unreachable, format!("static_fetch unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(attempt_failed(outcome_for_status(status), format!("static_fetch invalid response: {status}")));
        }

        let final_url = response.url().clone();
        self.validator.validate(final_url.as_str())?;

        let html = response
            .text()
            .await
            .map_err(|e| attempt_failed(AttemptOutcome::Unreachable, format!("static_fetch body read failed: {e}")))?;

        Ok(FetchOutcome {
            html,
            acquisition_metadata: AcquisitionMetadata::new("static_fetch"),
            cost_estimate: 0.05,
        })
    }
}

fn attempt_failed(outcome: AttemptOutcome, detail: String) -> AtlasError {
    AtlasError::AcquisitionAttemptFailed { strategy: "static_fetch".to_string(), outcome, detail }
}

/// `401`/`403` are an explicit block — retrying won't help. Everything
/// else non-2xx (`429`, `5xx`, odd redirects) is worth another attempt.
fn outcome_for_status(status: StatusCode) -> AttemptOutcome {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AttemptOutcome::Blocked,
        _ => AttemptOutcome::InvalidResponse,
    }
}
