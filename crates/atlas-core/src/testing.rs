//! Test doubles for the model client and content acquisition strategy
//! seams, for use in pipeline and crate-level integration tests.

use crate::error::Result;
use crate::model::{Invocation, InvocationResult, ModelClient, Stage};
use crate::strategy::{FetchOptions, FetchOutcome, Strategy, StrategyKind};
use crate::types::AcquisitionMetadata;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Record of a call made to [`MockModelClient`], for assertions.
#[derive(Debug, Clone)]
pub struct MockInvocationCall {
    pub stage: Stage,
    pub schema_name: String,
}

/// A scripted [`ModelClient`]: returns a queued response per stage, or
/// abstains once its queue for that stage is exhausted.
#[derive(Default)]
pub struct MockModelClient {
    responses: Arc<RwLock<std::collections::HashMap<&'static str, Vec<Value>>>>,
    calls: Arc<RwLock<Vec<MockInvocationCall>>>,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a stage; calls to that stage consume queued
    /// responses in order, then abstain once the queue is empty.
    pub fn with_response(self, stage: Stage, response: Value) -> Self {
        self.responses.write().unwrap().entry(stage.name()).or_default().push(response);
        self
    }

    pub fn calls(&self) -> Vec<MockInvocationCall> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn invoke(&self, invocation: Invocation) -> Result<InvocationResult> {
        self.calls.write().unwrap().push(MockInvocationCall {
            stage: invocation.stage,
            schema_name: invocation.schema_name.clone(),
        });

        let queued = self.responses.write().unwrap().get_mut(invocation.stage.name()).and_then(|q| {
            if q.is_empty() {
                None
            } else {
                Some(q.remove(0))
            }
        });

        match queued {
            Some(output) => Ok(InvocationResult {
                output: Some(output),
                abstained: false,
                tokens_in: 10,
                tokens_out: 10,
                duration: Duration::from_millis(50),
            }),
            None => Ok(InvocationResult::abstain(0, 0, Duration::from_millis(1))),
        }
    }
}

/// A [`Strategy`] that returns a fixed page of HTML, or a configured
/// error, regardless of the URL it's asked to fetch.
pub struct MockStrategy {
    kind: StrategyKind,
    html: Arc<RwLock<Option<String>>>,
    error: Arc<RwLock<Option<String>>>,
}

impl MockStrategy {
    pub fn new(kind: StrategyKind, html: impl Into<String>) -> Self {
        Self {
            kind,
            html: Arc::new(RwLock::new(Some(html.into()))),
            error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn failing(kind: StrategyKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            html: Arc::new(RwLock::new(None)),
            error: Arc::new(RwLock::new(Some(error.into()))),
        }
    }
}

#[async_trait]
impl Strategy for MockStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn fetch(&self, _url: &str, _options: &FetchOptions) -> Result<FetchOutcome> {
        if let Some(detail) = self.error.read().unwrap().clone() {
            return Err(crate::error::AtlasError::AllStrategiesFailed { detail });
        }
        let html = self.html.read().unwrap().clone().unwrap_or_default();
        Ok(FetchOutcome {
            html,
            acquisition_metadata: AcquisitionMetadata::new(self.kind.name()),
            cost_estimate: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_model_client_returns_queued_response_then_abstains() {
        let client = MockModelClient::new().with_response(Stage::Contract, serde_json::json!({"a": 1}));
        let invocation = Invocation {
            stage: Stage::Contract,
            system_prompt: "s".into(),
            user_prompt: "u".into(),
            schema_name: "x".into(),
            schema: serde_json::json!({}),
            budget: Stage::Contract.default_budget(),
            seed: 1,
        };
        let first = client.invoke(invocation.clone()).await.unwrap();
        assert!(!first.abstained);
        let second = client.invoke(invocation).await.unwrap();
        assert!(second.abstained);
    }

    #[tokio::test]
    async fn mock_strategy_reports_configured_failure() {
        let strategy = MockStrategy::failing(StrategyKind::StaticFetch, "blocked");
        let result = strategy.fetch("https://example.com", &FetchOptions::default()).await;
        assert!(result.is_err());
    }
}
