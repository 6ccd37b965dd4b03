//! Deterministic Track (C3): for every non-discoverable field in a
//! contract, run its detectors over the anchor index, validate, and
//! record hits/misses. Also runs the label-pattern discovery sub-pass
//! that seeds the Augmentation Track (C5).

use crate::anchor::AnchorIndex;
use crate::detect::{detectors, validators};
use crate::types::{Candidate, DeterministicFindings, FieldKind, FieldSpec, Hit, MissReason, Miss};
use std::collections::{HashMap, HashSet};

/// Run the full deterministic pass over `fields` (contract declaration
/// order — processing order is stable, not arbitrary, per §5).
pub fn run(index: &AnchorIndex, fields: &[FieldSpec]) -> DeterministicFindings {
    let mut findings = DeterministicFindings::default();

    for field in fields {
        if field.kind == FieldKind::Discoverable {
            continue;
        }
        run_field(index, field, &mut findings);
    }

    findings.candidates = discover_candidates(index);
    findings
}

fn run_field(index: &AnchorIndex, field: &FieldSpec, findings: &mut DeterministicFindings) {
    let detector_names: Vec<&str> = if field.detectors.is_empty() {
        detectors::all_detector_names().to_vec()
    } else {
        field.detectors.iter().map(String::as_str).collect()
    };

    let mut candidates: Vec<detectors::DetectorHit> = Vec::new();
    for name in &detector_names {
        candidates.extend(detectors::run(name, index));
    }

    if candidates.is_empty() {
        findings.misses.push(Miss {
            field: field.name.clone(),
            reason: MissReason::NoDetectorMatch,
            detectors_tried: detector_names.iter().map(|s| s.to_string()).collect(),
        });
        return;
    }

    // A validator failing to produce a typed value is recorded as
    // validation_failed, not extractor_error — the library detectors
    // never fail to run, only to match or validate.
    let valid: Vec<(detectors::DetectorHit, serde_json::Value)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            validators::canonical_extract(&candidate.value, field.field_type).map(|value| (candidate, value))
        })
        .collect();

    if valid.is_empty() {
        findings.misses.push(Miss {
            field: field.name.clone(),
            reason: MissReason::ValidationFailed,
            detectors_tried: detector_names.iter().map(|s| s.to_string()).collect(),
        });
        return;
    }

    // Tie-break within a shared block: highest confidence, then longest
    // valid value, then earliest DOM order.
    let mut by_block: HashMap<Option<String>, Vec<(detectors::DetectorHit, serde_json::Value)>> = HashMap::new();
    for (candidate, value) in valid {
        let block = index.block_of(&candidate.anchor_id).map(str::to_string);
        by_block.entry(block).or_default().push((candidate, value));
    }

    // Process blocks in a stable order (HashMap iteration order is not
    // stable across runs) so that cross-block dedup below always keeps
    // the same survivor for a given document.
    let mut blocks: Vec<(Option<String>, Vec<(detectors::DetectorHit, serde_json::Value)>)> =
        by_block.into_iter().collect();
    blocks.sort_by(|(a, _), (b, _)| a.cmp(b));

    // Dedup by normalized text across the whole field — per §4.3,
    // cross-block duplicates are deduplicated by normalized text, not
    // kept once per block.
    let mut seen_text: HashSet<String> = HashSet::new();
    let mut support = 0u32;
    for (_block, mut members) in blocks {
        members.sort_by(|(ca, va), (cb, vb)| {
            cb.confidence
                .partial_cmp(&ca.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| value_len(vb).cmp(&value_len(va)))
                .then_with(|| ca.anchor_id.cmp(&cb.anchor_id))
        });

        for (candidate, value) in members {
            let normalized = normalized_text(&value);
            if !seen_text.insert(normalized) {
                continue;
            }
            findings.hits.push(Hit {
                field: field.name.clone(),
                value,
                anchor_id: candidate.anchor_id,
                confidence: candidate.confidence,
                detector: candidate.detector.to_string(),
            });
            support += 1;
        }
    }

    *findings.support_map.entry(field.name.clone()).or_insert(0) += support;
}

fn value_len(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::String(s) => s.chars().count(),
        other => other.to_string().len(),
    }
}

fn normalized_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_lowercase(),
        other => other.to_string(),
    }
}

/// Label-like elements repeating across ≥ 2 blocks seed the augmentation
/// track as new-field candidates.
fn discover_candidates(index: &AnchorIndex) -> Vec<Candidate> {
    let label_hits = detectors::detect_label_value(index);
    let mut by_label: HashMap<String, Vec<(String, Option<String>)>> = HashMap::new();

    for hit in label_hits {
        let block = index.block_of(&hit.anchor_id).map(str::to_string);
        by_label.entry(hit.value.to_lowercase()).or_default().push((hit.anchor_id, block));
    }

    let mut out = Vec::new();
    for (label, occurrences) in by_label {
        let distinct_blocks: HashSet<&Option<String>> = occurrences.iter().map(|(_, b)| b).collect();
        if distinct_blocks.len() >= 2 {
            out.push(Candidate {
                pattern_label: label,
                instances: occurrences.len() as u32,
                sample_anchor_ids: occurrences.into_iter().take(5).map(|(id, _)| id).collect(),
            });
        }
    }
    out.sort_by(|a, b| a.pattern_label.cmp(&b.pattern_label));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldType;

    #[test]
    fn missing_detector_match_is_recorded_as_miss() {
        let index = AnchorIndex::build("<html><body><p>nothing relevant</p></body></html>");
        let field = FieldSpec::new("email", FieldKind::Required, FieldType::Email)
            .with_detectors(["email"]);
        let findings = run(&index, &[field]);
        assert_eq!(findings.misses.len(), 1);
        assert_eq!(findings.misses[0].reason, MissReason::NoDetectorMatch);
    }

    #[test]
    fn valid_hit_increments_support() {
        let index = AnchorIndex::build(
            "<html><body><a href=\"mailto:a@example.com\">Email</a></body></html>",
        );
        let field = FieldSpec::new("email", FieldKind::Required, FieldType::Email)
            .with_detectors(["email"]);
        let findings = run(&index, &[field]);
        assert_eq!(findings.support_for("email"), 1);
        assert_eq!(findings.hits.len(), 1);
    }

    #[test]
    fn discoverable_fields_are_skipped_in_deterministic_pass() {
        let index = AnchorIndex::build("<html><body><p>x</p></body></html>");
        let field = FieldSpec::new("mystery", FieldKind::Discoverable, FieldType::String);
        let findings = run(&index, &[field]);
        assert!(findings.hits.is_empty());
        assert!(findings.misses.is_empty());
    }

    #[test]
    fn repeated_label_across_blocks_becomes_a_candidate() {
        let html = "<html><body><ul>\
            <li><dt>Location:</dt><span>NYC</span></li>\
            <li><dt>Location:</dt><span>LA</span></li>\
            </ul></body></html>";
        let index = AnchorIndex::build(html);
        let candidates = discover_candidates(&index);
        assert!(candidates.iter().any(|c| c.pattern_label == "location:"));
    }

    #[test]
    fn identical_value_in_two_different_blocks_is_deduped_once() {
        let html = "<html><body><ul>\
            <li><h3>Front Desk</h3><span>$9.99</span></li>\
            <li><h3>Back Office</h3><span>$9.99</span></li>\
            </ul></body></html>";
        let index = AnchorIndex::build(html);
        let field = FieldSpec::new("price", FieldKind::Required, FieldType::Number).with_detectors(["price"]);
        let findings = run(&index, &[field]);
        assert_eq!(findings.support_for("price"), 1);
        assert_eq!(findings.hits.len(), 1);
    }

    #[test]
    fn distinct_values_in_different_blocks_both_survive() {
        let html = "<html><body><ul>\
            <li><h3>Front Desk</h3><span>$9.99</span></li>\
            <li><h3>Back Office</h3><span>$4.50</span></li>\
            </ul></body></html>";
        let index = AnchorIndex::build(html);
        let field = FieldSpec::new("price", FieldKind::Required, FieldType::Number).with_detectors(["price"]);
        let findings = run(&index, &[field]);
        assert_eq!(findings.support_for("price"), 2);
        assert_eq!(findings.hits.len(), 2);
    }
}
