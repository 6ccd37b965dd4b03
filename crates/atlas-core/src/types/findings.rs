//! Output of the deterministic track (C3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub field: String,
    pub value: serde_json::Value,
    pub anchor_id: String,
    pub confidence: f32,
    /// Name of the detector that produced this hit (`"email"`,
    /// `"phone"`, ...) — carried through so PII classification can key
    /// off the detector that ran rather than the field's declared type.
    pub detector: String,
}

/// Reason a field produced no hit. `ExtractorError` is recorded, not
/// treated as field removal — whether the field survives belongs to the
/// negotiator (C7), not the detector that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
    NoDetectorMatch,
    ValidationFailed,
    ExtractorError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Miss {
    pub field: String,
    pub reason: MissReason,
    pub detectors_tried: Vec<String>,
}

/// A repeated label-like pattern (`dt`, `strong`-prefixed label, text
/// ending in `:`) discovered across ≥ 2 blocks, seeded to the
/// augmentation track as a new-field candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub pattern_label: String,
    pub instances: u32,
    pub sample_anchor_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeterministicFindings {
    pub hits: Vec<Hit>,
    pub misses: Vec<Miss>,
    pub candidates: Vec<Candidate>,
    pub support_map: HashMap<String, u32>,
    pub block_map: HashMap<String, String>,
}

impl DeterministicFindings {
    pub fn support_for(&self, field: &str) -> u32 {
        self.support_map.get(field).copied().unwrap_or(0)
    }

    pub fn hits_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Hit> {
        self.hits.iter().filter(move |h| h.field == field)
    }

    /// Merge findings from another page of the same multi-page job: hits
    /// and misses concatenate, support counts add, later pages never
    /// overwrite an earlier block-id mapping for the same anchor.
    pub fn merge(&mut self, other: DeterministicFindings) {
        self.hits.extend(other.hits);
        self.misses.extend(other.misses);
        self.candidates.extend(other.candidates);
        for (field, count) in other.support_map {
            *self.support_map.entry(field).or_insert(0) += count;
        }
        for (anchor, block) in other.block_map {
            self.block_map.entry(anchor).or_insert(block);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_support_counts() {
        let mut a = DeterministicFindings::default();
        a.support_map.insert("name".into(), 3);
        let mut b = DeterministicFindings::default();
        b.support_map.insert("name".into(), 2);
        a.merge(b);
        assert_eq!(a.support_for("name"), 5);
    }

    #[test]
    fn merge_concatenates_hits() {
        let mut a = DeterministicFindings::default();
        a.hits.push(Hit { field: "name".into(), value: serde_json::json!("x"), anchor_id: "n_1".into(), confidence: 1.0, detector: "heading".into() });
        let mut b = DeterministicFindings::default();
        b.hits.push(Hit { field: "name".into(), value: serde_json::json!("y"), anchor_id: "n_2".into(), confidence: 1.0, detector: "heading".into() });
        a.merge(b);
        assert_eq!(a.hits.len(), 2);
    }
}
