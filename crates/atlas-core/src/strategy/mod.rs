//! Strategy & Fallback (C9): ordered content-acquisition chains with
//! per-strategy timeouts, transient-error backoff, and an emergency
//! fallback when every strategy in the chain fails.

mod selector;
mod validator;

pub use selector::Selector;
pub use validator::UrlValidator;

use crate::error::{AtlasError, Result};
use crate::types::{AcquisitionMetadata, AttemptOutcome, StrategyAttempt};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    StaticFetch,
    BrowserRender,
    BrowserJs,
    Hybrid,
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::StaticFetch => "static_fetch",
            StrategyKind::BrowserRender => "browser_render",
            StrategyKind::BrowserJs => "browser_js",
            StrategyKind::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub preferred_strategy: Option<String>,
}

/// Returned by every strategy alongside the acquired HTML and a relative
/// cost estimate (used by the Selector to bias future choices).
pub struct FetchOutcome {
    pub html: String,
    pub acquisition_metadata: AcquisitionMetadata,
    pub cost_estimate: f32,
}

/// A black-box content acquisition strategy. Concrete implementations
/// (`static_fetch` and friends) live in `atlas-cli`, which is where the
/// network/browser dependencies belong.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchOutcome>;
}

/// One entry in an ordered fallback chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainStep {
    pub strategy: StrategyKind,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct FallbackChain {
    pub name: String,
    pub steps: Vec<ChainStep>,
}

/// A transient error retries (1x, then 2x backoff); anything else skips
/// remaining retries for that strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Permanent,
}

fn classify(error: &AtlasError) -> ErrorClass {
    match error {
        AtlasError::TimeoutStage { .. } => ErrorClass::Transient,
        AtlasError::Security(crate::error::SecurityError::DnsResolution(_)) => ErrorClass::Transient,
        AtlasError::AcquisitionAttemptFailed { outcome, .. } => match outcome {
            AttemptOutcome::Unreachable | AttemptOutcome::InvalidResponse => ErrorClass::Transient,
            AttemptOutcome::Blocked => ErrorClass::Permanent,
            AttemptOutcome::Success | AttemptOutcome::Timeout | AttemptOutcome::Miss => ErrorClass::Permanent,
        },
        _ => ErrorClass::Permanent,
    }
}

/// The attempt outcome this error represents, for attempts telemetry —
/// falls back to `InvalidResponse` for errors with no more specific
/// classification (a non-strategy error reaching here is itself
/// unexpected, but still needs *some* outcome recorded).
fn outcome_for(error: &AtlasError) -> AttemptOutcome {
    match error {
        AtlasError::AcquisitionAttemptFailed { outcome, .. } => *outcome,
        _ => AttemptOutcome::InvalidResponse,
    }
}

/// Predefined fallback chains (§4.9). `fast` tries the cheapest strategy
/// only with a short timeout; `robust` exhausts every strategy with
/// generous timeouts.
pub fn predefined_chain(name: &str) -> Option<FallbackChain> {
    let steps = match name {
        "fast" => vec![ChainStep { strategy: StrategyKind::StaticFetch, timeout: Duration::from_secs(5) }],
        "quality" => vec![
            ChainStep { strategy: StrategyKind::BrowserRender, timeout: Duration::from_secs(15) },
            ChainStep { strategy: StrategyKind::StaticFetch, timeout: Duration::from_secs(5) },
        ],
        "balanced" => vec![
            ChainStep { strategy: StrategyKind::StaticFetch, timeout: Duration::from_secs(8) },
            ChainStep { strategy: StrategyKind::BrowserRender, timeout: Duration::from_secs(12) },
        ],
        "cost_optimized" => vec![
            ChainStep { strategy: StrategyKind::StaticFetch, timeout: Duration::from_secs(10) },
        ],
        "robust" => vec![
            ChainStep { strategy: StrategyKind::StaticFetch, timeout: Duration::from_secs(8) },
            ChainStep { strategy: StrategyKind::BrowserRender, timeout: Duration::from_secs(15) },
            ChainStep { strategy: StrategyKind::BrowserJs, timeout: Duration::from_secs(20) },
            ChainStep { strategy: StrategyKind::Hybrid, timeout: Duration::from_secs(25) },
        ],
        _ => return None,
    };
    Some(FallbackChain { name: name.to_string(), steps })
}

/// Run a strategy with a timeout and transient-error backoff (1x then
/// 2x). A strategy is only "valid" once its HTML yields at least one
/// detected content block; callers check that via `has_content_block`.
pub async fn run_strategy(
    strategy: &dyn Strategy,
    step: ChainStep,
    url: &str,
    options: &FetchOptions,
) -> (Result<FetchOutcome>, Vec<StrategyAttempt>) {
    let mut attempts = Vec::new();
    let backoffs = [Duration::ZERO, step.timeout, step.timeout * 2];

    for (attempt_index, backoff) in backoffs.iter().enumerate() {
        if attempt_index > 0 {
            tokio::time::sleep(*backoff).await;
        }

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(step.timeout, strategy.fetch(url, options)).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(fetch_outcome)) => {
                attempts.push(StrategyAttempt {
                    strategy: strategy.kind().name().to_string(),
                    outcome: AttemptOutcome::Success,
                    duration_ms: elapsed.as_millis() as u64,
                });
                return (Ok(fetch_outcome), attempts);
            }
            Ok(Err(err)) => {
                attempts.push(StrategyAttempt {
                    strategy: strategy.kind().name().to_string(),
                    outcome: outcome_for(&err),
                    duration_ms: elapsed.as_millis() as u64,
                });
                if classify(&err) == ErrorClass::Permanent || attempt_index == backoffs.len() - 1 {
                    return (Err(err), attempts);
                }
            }
            Err(_) => {
                attempts.push(StrategyAttempt {
                    strategy: strategy.kind().name().to_string(),
                    outcome: AttemptOutcome::Timeout,
                    duration_ms: elapsed.as_millis() as u64,
                });
                if attempt_index == backoffs.len() - 1 {
                    return (
                        Err(AtlasError::TimeoutStage {
                            stage: strategy.kind().name().to_string(),
                            elapsed_ms: elapsed.as_millis() as u64,
                            limit_ms: step.timeout.as_millis() as u64,
                        }),
                        attempts,
                    );
                }
            }
        }
    }
    unreachable!("loop always returns within its backoff schedule")
}

/// Walks `chain` in order, returning the first valid acquisition.
/// `has_content_block` decides validity (≥ 1 detected block via C3).
/// If every step fails, an emergency fallback is invoked: a plain static
/// fetch flagged `partial: true`.
pub async fn acquire(
    chain: &FallbackChain,
    strategies: &[&dyn Strategy],
    emergency: &dyn Strategy,
    url: &str,
    options: &FetchOptions,
    has_content_block: impl Fn(&str) -> bool,
) -> Result<FetchOutcome> {
    let mut all_attempts = Vec::new();

    for step in &chain.steps {
        let Some(strategy) = strategies.iter().find(|s| s.kind() == step.strategy) else { continue };
        let (result, attempts) = run_strategy(*strategy, *step, url, options).await;
        all_attempts.extend(attempts);

        match result {
            Ok(outcome) if has_content_block(&outcome.html) => {
                let mut metadata = outcome.acquisition_metadata;
                metadata.attempts = all_attempts;
                return Ok(FetchOutcome { html: outcome.html, acquisition_metadata: metadata, cost_estimate: outcome.cost_estimate });
            }
            Ok(_) => {
                all_attempts.push(StrategyAttempt {
                    strategy: step.strategy.name().to_string(),
                    outcome: AttemptOutcome::Miss,
                    duration_ms: 0,
                });
            }
            Err(_) => {}
        }
    }

    match emergency.fetch(url, options).await {
        Ok(mut outcome) => {
            outcome.acquisition_metadata.partial = true;
            outcome.acquisition_metadata.attempts = all_attempts;
            Ok(outcome)
        }
        Err(err) => Err(AtlasError::AllStrategiesFailed { detail: err.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_chains_are_nonempty() {
        for name in ["fast", "quality", "balanced", "cost_optimized", "robust"] {
            assert!(predefined_chain(name).is_some());
        }
    }

    #[test]
    fn unknown_chain_name_returns_none() {
        assert!(predefined_chain("nonexistent").is_none());
    }

    #[test]
    fn robust_chain_tries_every_strategy() {
        let chain = predefined_chain("robust").unwrap();
        assert_eq!(chain.steps.len(), 4);
    }

    #[test]
    fn unreachable_and_invalid_response_are_transient() {
        let unreachable = AtlasError::AcquisitionAttemptFailed {
            strategy: "static_fetch".into(),
            outcome: AttemptOutcome::Unreachable,
            detail: "connection reset".into(),
        };
        let invalid = AtlasError::AcquisitionAttemptFailed {
            strategy: "static_fetch".into(),
            outcome: AttemptOutcome::InvalidResponse,
            detail: "429".into(),
        };
        assert_eq!(classify(&unreachable), ErrorClass::Transient);
        assert_eq!(classify(&invalid), ErrorClass::Transient);
    }

    #[test]
    fn blocked_acquisition_attempt_is_permanent() {
        let blocked = AtlasError::AcquisitionAttemptFailed {
            strategy: "static_fetch".into(),
            outcome: AttemptOutcome::Blocked,
            detail: "403".into(),
        };
        assert_eq!(classify(&blocked), ErrorClass::Permanent);
    }

    #[test]
    fn outcome_for_extracts_the_carried_outcome() {
        let err = AtlasError::AcquisitionAttemptFailed {
            strategy: "static_fetch".into(),
            outcome: AttemptOutcome::Blocked,
            detail: "403".into(),
        };
        assert_eq!(outcome_for(&err), AttemptOutcome::Blocked);
        assert_eq!(outcome_for(&AtlasError::Cancelled), AttemptOutcome::InvalidResponse);
    }
}
