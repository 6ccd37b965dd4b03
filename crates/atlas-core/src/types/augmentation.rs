//! Output of the augmentation track (C5), already cross-validated against
//! the anchor index by the time it reaches the negotiator.

use super::field::FieldType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub field: String,
    pub value: serde_json::Value,
    pub anchor_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFieldProposal {
    pub name: String,
    pub field_type: FieldType,
    pub anchor_ids: Vec<String>,
    pub support_count: u32,
    pub block_count: u32,
    pub sample_values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Normalization {
    pub from: String,
    pub to: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AugmentationResult {
    pub completions: Vec<Completion>,
    pub new_field_proposals: Vec<NewFieldProposal>,
    pub normalizations: Vec<Normalization>,
}
