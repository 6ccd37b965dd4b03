//! Model Client (C4): a uniform, budgeted call surface into an external
//! language model, shared by the Contract Generator (C6), Augmentation
//! Track (C5), and Schema Negotiator (C7).
//!
//! `invoke(stage, prompt, schema, budget) → { output?, abstained,
//! tokens_in, tokens_out, duration }` (§4.4). Every call is deterministic
//! (temperature 0, stable seed), every call declares a JSON Schema, and
//! abstention is always a valid response — never an error.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// The pipeline stage issuing a call, used for budget lookup and
/// telemetry tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Contract,
    Augmentation,
    Validation,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Contract => "contract",
            Stage::Augmentation => "augmentation",
            Stage::Validation => "validation",
        }
    }

    /// Indicative per-stage budgets (§4.4): `(max_output_tokens,
    /// max_duration_ms)`. Callers may override with a tighter job budget;
    /// these are the defaults when the job supplies none.
    pub fn default_budget(self) -> Budget {
        match self {
            Stage::Contract => Budget { max_output_tokens: 500, max_duration: Duration::from_millis(800) },
            Stage::Augmentation => Budget { max_output_tokens: 400, max_duration: Duration::from_millis(1200) },
            Stage::Validation => Budget { max_output_tokens: 100, max_duration: Duration::from_millis(600) },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub max_output_tokens: u32,
    pub max_duration: Duration,
}

/// A single call into the model, fully describing what's asked of it.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub stage: Stage,
    pub system_prompt: String,
    pub user_prompt: String,
    pub schema_name: String,
    pub schema: Value,
    pub budget: Budget,
    pub seed: u64,
}

/// Result of a call. `output` is `None` exactly when `abstained` is true —
/// abstention purity (§8): a stage that abstains produces no outputs
/// besides its abstention record.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub output: Option<Value>,
    pub abstained: bool,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub duration: Duration,
}

impl InvocationResult {
    pub fn abstain(tokens_in: u32, tokens_out: u32, duration: Duration) -> Self {
        Self { output: None, abstained: true, tokens_in, tokens_out, duration }
    }
}

/// The sentinel response that is always schema-valid and always means
/// "no information", never an error.
pub const ABSTAIN_SENTINEL: &str = r#"{"status":"abstain"}"#;

fn is_abstain_sentinel(raw: &str) -> bool {
    serde_json::from_str::<Value>(raw.trim())
        .ok()
        .and_then(|v| v.get("status").and_then(Value::as_str).map(|s| s == "abstain"))
        .unwrap_or(false)
}

/// Implemented once per backend. `atlas-core` depends only on this trait;
/// concrete backends (OpenAI, a test double) live behind it.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn invoke(&self, invocation: Invocation) -> crate::error::Result<InvocationResult>;
}

/// Wraps a raw JSON-schema-constrained completion call with the C4
/// contract: schema validation with one constrained retry, then
/// abstention; abstention-sentinel recognition; budget bookkeeping.
///
/// Concrete `ModelClient` implementations call this from `invoke` rather
/// than reimplementing the retry/abstention contract themselves.
pub async fn enforce_contract<F, Fut>(
    invocation: &Invocation,
    mut call: F,
) -> crate::error::Result<InvocationResult>
where
    F: FnMut(&Invocation) -> Fut,
    Fut: std::future::Future<Output = crate::error::Result<(String, u32, u32, Duration)>>,
{
    for attempt in 0..2 {
        let (raw, tokens_in, tokens_out, duration) = call(invocation).await?;

        if is_abstain_sentinel(&raw) {
            return Ok(InvocationResult::abstain(tokens_in, tokens_out, duration));
        }

        if duration > invocation.budget.max_duration || tokens_out > invocation.budget.max_output_tokens {
            return Ok(InvocationResult::abstain(tokens_in, tokens_out, duration));
        }

        match validate_against_schema(&raw, &invocation.schema) {
            Ok(value) => {
                return Ok(InvocationResult {
                    output: Some(value),
                    abstained: false,
                    tokens_in,
                    tokens_out,
                    duration,
                })
            }
            Err(_) if attempt == 0 => continue,
            Err(_) => return Ok(InvocationResult::abstain(tokens_in, tokens_out, duration)),
        }
    }
    unreachable!("loop always returns within two attempts")
}

/// Parses `raw` as JSON and checks it's an object carrying every property
/// named in `schema.items.properties.required` (a pragmatic stand-in for
/// full JSON Schema validation, sufficient for the strict, flat contracts
/// this pipeline generates).
fn validate_against_schema(raw: &str, schema: &Value) -> Result<Value, String> {
    let value: Value = serde_json::from_str(raw.trim()).map_err(|e| e.to_string())?;
    let required = schema
        .pointer("/items/required")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if let Some(obj) = value.as_object() {
        for field in &required {
            let Some(name) = field.as_str() else { continue };
            if !obj.contains_key(name) {
                return Err(format!("missing required field: {name}"));
            }
        }
        Ok(value)
    } else if value.is_array() {
        Ok(value)
    } else {
        Err("response is neither an object nor an array".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation() -> Invocation {
        Invocation {
            stage: Stage::Contract,
            system_prompt: "system".into(),
            user_prompt: "user".into(),
            schema_name: "test_schema".into(),
            schema: serde_json::json!({"items": {"required": ["name"]}}),
            budget: Stage::Contract.default_budget(),
            seed: 42,
        }
    }

    #[tokio::test]
    async fn recognizes_abstain_sentinel() {
        let invocation = invocation();
        let result = enforce_contract(&invocation, |_| async {
            Ok((ABSTAIN_SENTINEL.to_string(), 10, 5, Duration::from_millis(100)))
        })
        .await
        .unwrap();
        assert!(result.abstained);
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn budget_overrun_converts_to_abstention() {
        let invocation = invocation();
        let result = enforce_contract(&invocation, |inv| async move {
            Ok((
                r#"{"name":"x"}"#.to_string(),
                10,
                inv.budget.max_output_tokens + 1,
                Duration::from_millis(100),
            ))
        })
        .await
        .unwrap();
        assert!(result.abstained);
    }

    #[tokio::test]
    async fn schema_violation_retries_once_then_abstains() {
        let invocation = invocation();
        let mut calls = 0;
        let result = enforce_contract(&invocation, |_| {
            calls += 1;
            async move { Ok((r#"{"other":"x"}"#.to_string(), 10, 5, Duration::from_millis(100))) }
        })
        .await
        .unwrap();
        assert_eq!(calls, 2);
        assert!(result.abstained);
    }

    #[tokio::test]
    async fn valid_response_within_budget_succeeds() {
        let invocation = invocation();
        let result = enforce_contract(&invocation, |_| async {
            Ok((r#"{"name":"x"}"#.to_string(), 10, 5, Duration::from_millis(100)))
        })
        .await
        .unwrap();
        assert!(!result.abstained);
        assert!(result.output.is_some());
    }
}
