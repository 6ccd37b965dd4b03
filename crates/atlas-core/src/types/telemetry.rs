//! Structured telemetry events emitted across a job's lifetime (A1, §4.10).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    ContractGenerated { contract_id: String, mode: String, field_count: u32 },
    DeterministicPass { hits: u32, misses: u32, candidates: u32 },
    LlmAugmentation { completions: u32, proposals: u32, abstained: bool },
    ContractValidation { valid: bool, detail: Option<String> },
    FallbackTaken { from_strategy: String, to_strategy: String, reason: String },
    CacheHit { namespace: String, key: String },
    JobCompleted { status: String, duration_ms: u64 },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::ContractGenerated { .. } => "ContractGenerated",
            TelemetryEvent::DeterministicPass { .. } => "DeterministicPass",
            TelemetryEvent::LlmAugmentation { .. } => "LLMAugmentation",
            TelemetryEvent::ContractValidation { .. } => "ContractValidation",
            TelemetryEvent::FallbackTaken { .. } => "FallbackTaken",
            TelemetryEvent::CacheHit { .. } => "CacheHit",
            TelemetryEvent::JobCompleted { .. } => "JobCompleted",
        }
    }
}

/// An envelope wrapping a [`TelemetryEvent`] with the ordering fields
/// every event carries: events for one job are totally ordered by
/// `correlation_id` + `sequence`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEnvelope {
    pub correlation_id: String,
    pub sequence: u64,
    pub event: TelemetryEvent,
}
