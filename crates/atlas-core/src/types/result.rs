//! Output of the extraction executor (C8) and final job result.

use super::evidence::FieldEvidence;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timings {
    pub acquire_ms: u64,
    pub anchor_ms: u64,
    pub contract_ms: u64,
    pub deterministic_ms: u64,
    pub augmentation_ms: u64,
    pub negotiate_ms: u64,
    pub extract_ms: u64,
}

impl Timings {
    pub fn total(&self) -> Duration {
        Duration::from_millis(
            self.acquire_ms
                + self.anchor_ms
                + self.contract_ms
                + self.deterministic_ms
                + self.augmentation_ms
                + self.negotiate_ms
                + self.extract_ms,
        )
    }
}

/// `data` conforms to `final_schema` by construction — every producer of
/// this type filters to `final_schema` properties before returning it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub contract_id: String,
    pub mode: super::job::Mode,
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Per-entity, per-field evidence trail, aligned by index with `data`.
    pub evidence: Vec<Vec<FieldEvidence>>,
    pub dropped_entities_count: u32,
    pub fields_omitted: Vec<String>,
    pub per_field_support: HashMap<String, u32>,
    pub cost: super::job::JobCost,
    pub timings: Timings,
}
