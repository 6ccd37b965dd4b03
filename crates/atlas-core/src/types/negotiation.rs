//! Output of the schema negotiator (C7).

use super::field::FieldSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiationStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Changes {
    pub pruned: Vec<String>,
    pub added: Vec<String>,
    pub demoted: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub total_support: u32,
    pub field_coverage: f32,
    pub reliability_score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationResult {
    pub status: NegotiationStatus,
    pub final_schema: Vec<FieldSpec>,
    pub changes: Changes,
    pub evidence_summary: EvidenceSummary,
    pub reason: Option<String>,
}
