//! Augmentation Track (C5): model-proposed completions, new-field
//! proposals, and normalizations — each accepted only after
//! cross-validation against the anchor index.

use crate::anchor::AnchorIndex;
use crate::detect::validators;
use crate::error::Result;
use crate::model::{Invocation, ModelClient, Stage};
use crate::types::{
    AugmentationResult, Completion, DeterministicFindings, EvidencePolicy, FieldSpec, FieldType,
    NewFieldProposal, Normalization,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

const TOKEN_JACCARD_THRESHOLD: f64 = 0.8;
const SAMPLE_BLOCK_LIMIT: usize = 5;

fn augmentation_schema() -> serde_json::Value {
    serde_json::json!({
        "items": {
            "type": "object",
            "properties": {
                "completions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "field": { "type": "string" },
                            "value": {},
                            "anchor_ids": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["field", "value", "anchor_ids"],
                        "additionalProperties": false,
                        "unevaluatedProperties": false
                    }
                },
                "new_fields": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "field_type": { "type": "string" },
                            "anchor_ids": { "type": "array", "items": { "type": "string" } },
                            "sample_values": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["name", "field_type", "anchor_ids"],
                        "additionalProperties": false,
                        "unevaluatedProperties": false
                    }
                },
                "normalizations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "from": { "type": "string" },
                            "to": { "type": "string" },
                            "reason": { "type": "string" }
                        },
                        "required": ["from", "to", "reason"],
                        "additionalProperties": false,
                        "unevaluatedProperties": false
                    }
                }
            },
            "required": ["completions", "new_fields", "normalizations"],
            "additionalProperties": false,
            "unevaluatedProperties": false
        }
    })
}

#[derive(Debug, Deserialize)]
struct RawCompletion {
    field: String,
    value: serde_json::Value,
    anchor_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawNewField {
    name: String,
    field_type: String,
    anchor_ids: Vec<String>,
    #[serde(default)]
    sample_values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawNormalization {
    from: String,
    to: String,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct RawAugmentation {
    completions: Vec<RawCompletion>,
    new_fields: Vec<RawNewField>,
    normalizations: Vec<RawNormalization>,
}

fn parse_field_type(s: &str) -> Option<FieldType> {
    match s {
        "string" => Some(FieldType::String),
        "email" => Some(FieldType::Email),
        "url" => Some(FieldType::Url),
        "enum" => Some(FieldType::Enum),
        "richtext" => Some(FieldType::Richtext),
        "number" => Some(FieldType::Number),
        "boolean" => Some(FieldType::Boolean),
        "date" => Some(FieldType::Date),
        "array-of-string" => Some(FieldType::ArrayOfString),
        _ => None,
    }
}

fn tokenize(s: &str) -> HashSet<String> {
    s.to_lowercase().split_whitespace().map(str::to_string).collect()
}

fn token_jaccard(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn value_as_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A claim passes cross-validation only if it cites enough anchors to
/// satisfy `evidence_policy`, every cited anchor resolves, the
/// re-extracted text is ≥ 0.8 token-Jaccard similar to the claim, and
/// the value passes the declared type's validator.
///
/// When `require_anchors` is `false`, an anchor-free claim isn't
/// auto-rejected for lacking anchors — it still has to pass the type
/// validator on its own, since cross-validation's other checks have no
/// anchor to re-extract against.
fn cross_validate(
    index: &AnchorIndex,
    anchor_ids: &[String],
    claimed_value: &str,
    field_type: FieldType,
    evidence_policy: &EvidencePolicy,
) -> bool {
    if anchor_ids.is_empty() {
        return !evidence_policy.require_anchors
            && validators::canonical_extract(claimed_value, field_type).is_some();
    }
    if evidence_policy.require_anchors && anchor_ids.len() < evidence_policy.min_anchors_per_field as usize {
        return false;
    }
    for anchor_id in anchor_ids {
        let Some(full_text) = index.full_text_of(anchor_id) else {
            return false;
        };
        if token_jaccard(&full_text, claimed_value) < TOKEN_JACCARD_THRESHOLD {
            return false;
        }
    }
    validators::canonical_extract(claimed_value, field_type).is_some()
}

/// Runs the augmentation call and cross-validates every claim in the
/// response. Claims that fail cross-validation are discarded silently
/// from the result (and traced as `anchor_miss` for telemetry).
pub async fn run(
    model: &dyn ModelClient,
    index: &AnchorIndex,
    findings: &DeterministicFindings,
    contract_fields: &[FieldSpec],
    evidence_policy: &EvidencePolicy,
    seed: u64,
) -> Result<AugmentationResult> {
    let samples = index.build_samples(SAMPLE_BLOCK_LIMIT);
    let sample_context: Vec<String> = samples
        .iter()
        .filter_map(|id| index.text_of(id).map(|text| format!("{id}: {text}")))
        .collect();

    let invocation = Invocation {
        stage: Stage::Augmentation,
        system_prompt: "Complete missing expected fields only when you can cite resolvable \
            anchor ids. Propose new discoverable fields only for label-value patterns that \
            repeat across entities and blocks. Normalize field names to a canonical \
            vocabulary, with rationale."
            .to_string(),
        user_prompt: format!(
            "candidates:\n{:?}\n\nsample anchors:\n{}",
            findings.candidates,
            sample_context.join("\n")
        ),
        schema_name: "augmentation_result".to_string(),
        schema: augmentation_schema(),
        budget: Stage::Augmentation.default_budget(),
        seed,
    };

    let result = model.invoke(invocation).await?;
    let Some(output) = result.output else {
        return Ok(AugmentationResult::default());
    };

    let raw: RawAugmentation = match serde_json::from_value(output) {
        Ok(raw) => raw,
        Err(_) => return Ok(AugmentationResult::default()),
    };

    let field_types: HashMap<&str, FieldType> =
        contract_fields.iter().map(|f| (f.name.as_str(), f.field_type)).collect();

    let mut completions = Vec::new();
    for candidate in raw.completions {
        let Some(&field_type) = field_types.get(candidate.field.as_str()) else {
            tracing::debug!(field = %candidate.field, "anchor_miss: completion for unknown field");
            continue;
        };
        let claimed_text = value_as_text(&candidate.value);
        if cross_validate(index, &candidate.anchor_ids, &claimed_text, field_type, evidence_policy) {
            completions.push(Completion {
                field: candidate.field,
                value: candidate.value,
                anchor_ids: candidate.anchor_ids,
            });
        } else {
            tracing::debug!(field = %candidate.field, "anchor_miss: completion failed cross-validation");
        }
    }

    let mut new_field_proposals = Vec::new();
    for candidate in raw.new_fields {
        let Some(field_type) = parse_field_type(&candidate.field_type) else { continue };
        let block_ids: HashSet<&str> =
            candidate.anchor_ids.iter().filter_map(|id| index.block_of(id)).collect();
        let all_resolve = candidate.anchor_ids.iter().all(|id| index.lookup(id).is_some());
        if !all_resolve {
            tracing::debug!(name = %candidate.name, "anchor_miss: new field proposal has unresolved anchor");
            continue;
        }
        new_field_proposals.push(NewFieldProposal {
            name: candidate.name,
            field_type,
            support_count: candidate.anchor_ids.len() as u32,
            block_count: block_ids.len() as u32,
            anchor_ids: candidate.anchor_ids,
            sample_values: candidate.sample_values,
        });
    }

    let normalizations = raw
        .normalizations
        .into_iter()
        .filter(|n| validators::validate_string(&n.from, 1, 200) && validators::validate_string(&n.to, 1, 200))
        .map(|n| Normalization { from: n.from, to: n.to, reason: n.reason })
        .collect();

    Ok(AugmentationResult { completions, new_field_proposals, normalizations })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_jaccard_identical_text_is_one() {
        assert_eq!(token_jaccard("Office: NYC", "office: nyc"), 1.0);
    }

    #[test]
    fn token_jaccard_disjoint_text_is_zero() {
        assert_eq!(token_jaccard("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn cross_validate_rejects_unresolved_anchor() {
        let index = AnchorIndex::build("<html><body><p>Hello</p></body></html>");
        let policy = EvidencePolicy::default();
        assert!(!cross_validate(&index, &["n_9999".to_string()], "Hello", FieldType::String, &policy));
    }

    #[test]
    fn cross_validate_accepts_matching_anchor_and_type() {
        let index = AnchorIndex::build("<html><body><p>a@example.com</p></body></html>");
        let anchor_id = index.iter().find(|id| index.tag_of(id) == Some("p")).unwrap();
        let policy = EvidencePolicy::default();
        assert!(cross_validate(&index, &[anchor_id], "a@example.com", FieldType::Email, &policy));
    }

    #[test]
    fn cross_validate_rejects_zero_anchors_by_default() {
        let index = AnchorIndex::build("<html><body><p>a@example.com</p></body></html>");
        let policy = EvidencePolicy::default();
        assert!(!cross_validate(&index, &[], "a@example.com", FieldType::Email, &policy));
    }

    #[test]
    fn cross_validate_allows_zero_anchors_when_not_required() {
        let index = AnchorIndex::build("<html><body><p>a@example.com</p></body></html>");
        let policy = EvidencePolicy { require_anchors: false, min_anchors_per_field: 1 };
        assert!(cross_validate(&index, &[], "a@example.com", FieldType::Email, &policy));
    }

    #[test]
    fn cross_validate_enforces_min_anchors_per_field() {
        let index = AnchorIndex::build("<html><body><p>a@example.com</p><p>a@example.com</p></body></html>");
        let ids: Vec<String> = index.iter().filter(|id| index.tag_of(id) == Some("p")).collect();
        let policy = EvidencePolicy { require_anchors: true, min_anchors_per_field: 2 };
        assert!(!cross_validate(&index, &ids[..1], "a@example.com", FieldType::Email, &policy));
        assert!(cross_validate(&index, &ids, "a@example.com", FieldType::Email, &policy));
    }
}
