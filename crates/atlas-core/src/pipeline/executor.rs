//! Extraction Executor (C8): compositional assembly of the output array
//! from the negotiated schema, deterministic hits, and accepted
//! augmentation completions.
//!
//! Mode enforcement: strict drops entities missing a required field (and
//! fails the job if every entity is dropped); soft never drops for a
//! missing required field, instead demoting low-support required fields
//! to non-required in the echoed schema.

use crate::anchor::AnchorIndex;
use crate::error::{AtlasError, Result};
use crate::types::{AugmentationResult, DeterministicFindings, EvidenceRecord, FieldEvidence, FieldKind, FieldSpec, FieldType, Mode};
use std::collections::HashMap;

const SOFT_REQUIRED_DEMOTION_RATE: f32 = 0.6;

pub struct ExecutionOutput {
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    pub evidence: Vec<Vec<FieldEvidence>>,
    pub echoed_schema: Vec<FieldSpec>,
    pub dropped_entities_count: u32,
    pub fields_omitted: Vec<String>,
    pub per_field_support: HashMap<String, u32>,
}

/// A field value resolved for one entity, plus the evidence needed to
/// build its `FieldEvidence` record: which anchor backed it (completions
/// anchored to a block but not a specific hit carry `None`) and which
/// PII class it belongs to, if any.
struct ResolvedValue {
    value: serde_json::Value,
    anchor_id: Option<String>,
    pii_kind: &'static str,
}

/// PII classification for a model completion, which carries no detector
/// name to consult. Only the types `EvidenceRecord::new` actually masks
/// are mapped; everything else is not a PII class.
fn field_type_pii_kind(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Email => "email",
        _ => "",
    }
}

fn value_as_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn block_key(index: &AnchorIndex, anchor_id: &str) -> String {
    index.block_of(anchor_id).map(str::to_string).unwrap_or_else(|| anchor_id.to_string())
}

fn anchor_order(anchor_id: &str) -> u64 {
    anchor_id.trim_start_matches("n_").parse().unwrap_or(u64::MAX)
}

pub fn execute(
    index: &AnchorIndex,
    final_schema: &[FieldSpec],
    findings: &DeterministicFindings,
    augmentation: &AugmentationResult,
    mode: Mode,
    allowed_pii: &[String],
) -> Result<ExecutionOutput> {
    let mut block_order: Vec<String> = Vec::new();
    let mut seen_blocks = std::collections::HashSet::new();
    let mut hits_by_block_field: HashMap<(String, String), Vec<&crate::types::Hit>> = HashMap::new();

    let mut all_hits: Vec<&crate::types::Hit> = findings.hits.iter().collect();
    all_hits.sort_by_key(|h| anchor_order(&h.anchor_id));

    for hit in &all_hits {
        let block = block_key(index, &hit.anchor_id);
        if seen_blocks.insert(block.clone()) {
            block_order.push(block.clone());
        }
        hits_by_block_field.entry((block, hit.field.clone())).or_default().push(hit);
    }

    let mut completions_by_field: HashMap<&str, Vec<&crate::types::Completion>> = HashMap::new();
    for completion in &augmentation.completions {
        completions_by_field.entry(completion.field.as_str()).or_default().push(completion);
    }

    let mut entities = Vec::new();
    let mut entity_evidence = Vec::new();
    let mut dropped_entities_count = 0u32;
    let mut omitted_fields = std::collections::HashSet::new();
    let mut per_field_present: HashMap<String, u32> = HashMap::new();

    for block in &block_order {
        let mut entity = serde_json::Map::new();
        let mut evidence = Vec::new();
        let mut missing_required = false;

        for field in final_schema {
            let resolved = resolve_field_value(index, block, field, &hits_by_block_field, &completions_by_field);

            match resolved {
                Some(resolved) => {
                    if let Some(anchor_id) = &resolved.anchor_id {
                        let selector = index.selector_of(anchor_id).unwrap_or(anchor_id.as_str());
                        let text = value_as_text(&resolved.value);
                        let allow_plaintext = allowed_pii.iter().any(|p| p == resolved.pii_kind);
                        evidence.push(FieldEvidence {
                            field: field.name.clone(),
                            record: EvidenceRecord::new(anchor_id.clone(), selector, &text, resolved.pii_kind, allow_plaintext),
                        });
                    }
                    entity.insert(field.name.clone(), resolved.value);
                    *per_field_present.entry(field.name.clone()).or_insert(0) += 1;
                }
                None => {
                    if field.kind == FieldKind::Required {
                        missing_required = true;
                        if mode == Mode::Soft {
                            entity.insert(field.name.clone(), serde_json::Value::Null);
                        }
                    } else {
                        omitted_fields.insert(field.name.clone());
                    }
                }
            }
        }

        if missing_required && mode == Mode::Strict {
            dropped_entities_count += 1;
            continue;
        }

        entities.push(entity);
        entity_evidence.push(evidence);
    }

    if mode == Mode::Strict && !block_order.is_empty() && entities.is_empty() {
        let selectors_tried: Vec<String> = final_schema
            .iter()
            .filter(|f| f.kind == FieldKind::Required)
            .map(|f| f.name.clone())
            .collect();
        return Err(AtlasError::StrictModeDrop {
            selectors_tried,
            counts: vec![dropped_entities_count],
        });
    }

    let mut echoed_schema = final_schema.to_vec();
    if mode == Mode::Soft && !entities.is_empty() {
        let total = entities.len() as f32;
        for field in echoed_schema.iter_mut().filter(|f| f.kind == FieldKind::Required) {
            let present = *per_field_present.get(&field.name).unwrap_or(&0) as f32;
            if present / total < SOFT_REQUIRED_DEMOTION_RATE {
                field.kind = FieldKind::Optional;
            }
        }
    }

    let per_field_support = per_field_present;

    Ok(ExecutionOutput {
        data: entities,
        evidence: entity_evidence,
        echoed_schema,
        dropped_entities_count,
        fields_omitted: omitted_fields.into_iter().collect(),
        per_field_support,
    })
}

fn resolve_field_value(
    index: &AnchorIndex,
    block: &str,
    field: &FieldSpec,
    hits_by_block_field: &HashMap<(String, String), Vec<&crate::types::Hit>>,
    completions_by_field: &HashMap<&str, Vec<&crate::types::Completion>>,
) -> Option<ResolvedValue> {
    let key = (block.to_string(), field.name.clone());
    if let Some(hits) = hits_by_block_field.get(&key) {
        if field.field_type == FieldType::ArrayOfString {
            let values: Vec<serde_json::Value> = hits.iter().map(|h| h.value.clone()).collect();
            if !values.is_empty() {
                // Multiple hits share one field in a block: the evidence
                // record is anchored on the first, matching the order
                // callers see in the assembled array.
                let first = hits.first().expect("non-empty values implies non-empty hits");
                return Some(ResolvedValue {
                    value: serde_json::Value::Array(values),
                    anchor_id: Some(first.anchor_id.clone()),
                    pii_kind: pii_kind_for_hit(first),
                });
            }
        } else if let Some(hit) = hits.first() {
            return Some(ResolvedValue {
                value: hit.value.clone(),
                anchor_id: Some(hit.anchor_id.clone()),
                pii_kind: pii_kind_for_hit(hit),
            });
        }
    }

    completions_by_field.get(field.name.as_str()).and_then(|completions| {
        completions
            .iter()
            .find(|c| c.anchor_ids.iter().any(|id| block_key(index, id) == block))
            .map(|c| ResolvedValue {
                value: c.value.clone(),
                anchor_id: c.anchor_ids.first().cloned(),
                pii_kind: field_type_pii_kind(field.field_type),
            })
    })
}

/// `PII_FIELD_TYPES` is a list of detector-name strings; a hit's
/// `detector` lines up with it directly (`"email"`, `"phone"`, ...).
fn pii_kind_for_hit(hit: &crate::types::Hit) -> &'static str {
    crate::types::evidence::PII_FIELD_TYPES
        .iter()
        .find(|&&kind| kind == hit.detector)
        .copied()
        .unwrap_or("")
}
