//! Schema Negotiator (C7): reconciles a contract with what the
//! deterministic and augmentation tracks actually found, producing the
//! final field set the extraction executor builds entities against.
//!
//! Idempotent over `(contract, findings, augmentation)`: equal inputs
//! always yield an equal `NegotiationResult`.

use crate::types::{
    AugmentationResult, Changes, DeterministicFindings, EvidenceSummary, FieldKind, FieldSpec,
    Governance, NegotiationResult, NegotiationStatus,
};
use std::collections::HashSet;

const EXPECTED_DEMOTION_RATIO: f32 = 0.3;

pub fn negotiate(
    fields: &[FieldSpec],
    findings: &DeterministicFindings,
    augmentation: &AugmentationResult,
    governance: &Governance,
) -> NegotiationResult {
    let completed_fields: HashSet<&str> =
        augmentation.completions.iter().map(|c| c.field.as_str()).collect();

    // Required: zero support and no augmentation completion is fatal.
    for field in fields.iter().filter(|f| f.kind == FieldKind::Required) {
        let support = findings.support_for(&field.name);
        if support == 0 && !completed_fields.contains(field.name.as_str()) {
            return NegotiationResult {
                status: NegotiationStatus::Error,
                final_schema: Vec::new(),
                changes: Changes::default(),
                evidence_summary: EvidenceSummary::default(),
                reason: Some(format!(
                    "required field '{}' has zero support and no accepted augmentation",
                    field.name
                )),
            };
        }
    }

    let leading_expected_support = fields
        .iter()
        .filter(|f| f.kind == FieldKind::Expected)
        .map(|f| findings.support_for(&f.name))
        .max()
        .unwrap_or(0);

    let mut changes = Changes::default();
    let mut final_schema: Vec<FieldSpec> = Vec::new();

    for field in fields {
        match field.kind {
            FieldKind::Required => final_schema.push(field.clone()),
            FieldKind::Expected => {
                let support = findings.support_for(&field.name);
                if support == 0 && !completed_fields.contains(field.name.as_str()) {
                    changes.pruned.push(field.name.clone());
                    continue;
                }
                let ratio = if leading_expected_support == 0 {
                    1.0
                } else {
                    support as f32 / leading_expected_support as f32
                };
                if ratio < EXPECTED_DEMOTION_RATIO {
                    let mut demoted = field.clone();
                    demoted.kind = FieldKind::Optional;
                    changes.demoted.push(field.name.clone());
                    final_schema.push(demoted);
                } else {
                    final_schema.push(field.clone());
                }
            }
            FieldKind::Optional => final_schema.push(field.clone()),
            FieldKind::Discoverable => {}
        }
    }

    // Discoverable: promote proposals meeting quorum, cap at
    // max-discoverable-fields, tie-break (support desc, name asc).
    if governance.allow_new_fields {
        let mut eligible: Vec<&crate::types::NewFieldProposal> = augmentation
            .new_field_proposals
            .iter()
            .filter(|p| {
                p.support_count >= governance.min_support_threshold
                    && p.block_count >= governance.min_blocks_threshold
            })
            .collect();
        eligible.sort_by(|a, b| b.support_count.cmp(&a.support_count).then_with(|| a.name.cmp(&b.name)));
        eligible.truncate(governance.max_discoverable_fields as usize);

        for proposal in eligible {
            final_schema.push(FieldSpec::new(proposal.name.clone(), FieldKind::Optional, proposal.field_type));
            changes.added.push(proposal.name.clone());
        }
    }

    for normalization in &augmentation.normalizations {
        if let Some(field) = final_schema.iter_mut().find(|f| f.name == normalization.from) {
            field.name = normalization.to.clone();
        }
    }

    let supports: Vec<u32> = final_schema.iter().map(|f| findings.support_for(&f.name)).collect();
    let max_support = supports.iter().copied().max().unwrap_or(0).max(1);
    let reliability_score = if supports.is_empty() {
        0.0
    } else {
        let mean_ratio: f32 =
            supports.iter().map(|&s| s as f32 / max_support as f32).sum::<f32>() / supports.len() as f32;
        mean_ratio.clamp(0.0, 1.0)
    };

    let field_coverage = if fields.is_empty() {
        0.0
    } else {
        final_schema.len() as f32 / fields.len() as f32
    };

    NegotiationResult {
        status: NegotiationStatus::Success,
        final_schema,
        changes,
        evidence_summary: EvidenceSummary {
            total_support: supports.iter().sum(),
            field_coverage,
            reliability_score,
        },
        reason: None,
    }
}
