//! Contract Generator (C6): from `(query, normalized content sample)`,
//! produce a `SchemaContract`. Backed by the Model Client (Stage::Contract);
//! abstention falls back to a default "generic list of objects" contract
//! so the pipeline can proceed deterministic-only.

use crate::error::{AtlasError, Result};
use crate::model::{Invocation, ModelClient, Stage};
use crate::types::{
    EvidencePolicy, FieldKind, FieldSpec, FieldType, Governance, MissingPolicy, Mode, SchemaContract,
};
use serde::Deserialize;

const GENERATOR_NAME: &str = "atlas-codex-c6";
const CONTRACT_VERSION: u32 = 1;

/// Exploratory phrasing ("extract...", "list...", "find all...") selects
/// soft mode and allows a discoverable slot; everything else is treated
/// as asking for a specific field set (strict).
pub fn select_mode(query: &str) -> Mode {
    let lowered = query.to_lowercase();
    let exploratory = ["extract", "list", "find all", "discover", "collect"];
    if exploratory.iter().any(|kw| lowered.contains(kw)) {
        Mode::Soft
    } else {
        Mode::Strict
    }
}

/// The contract used when the generator abstains: a single discoverable
/// slot with no required/expected fields, so the deterministic track can
/// still populate something rather than fail the whole job.
pub fn default_contract(seed: u64, timestamp: impl Into<String>) -> SchemaContract {
    let fields = vec![FieldSpec::new("value", FieldKind::Discoverable, FieldType::String)];
    let governance = Governance::default();
    let evidence_policy = EvidencePolicy::default();
    let contract_id = SchemaContract::compute_id(
        GENERATOR_NAME,
        seed,
        Mode::Soft,
        &fields,
        &governance,
        &evidence_policy,
    );
    SchemaContract {
        contract_id,
        contract_version: CONTRACT_VERSION,
        generator: GENERATOR_NAME.to_string(),
        seed,
        timestamp: timestamp.into(),
        mode: Mode::Soft,
        fields,
        governance,
        evidence_policy,
        missing_policy: MissingPolicy::default(),
    }
}

#[derive(Debug, Deserialize)]
struct ProposedField {
    name: String,
    kind: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    enum_values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProposedFields {
    fields: Vec<ProposedField>,
}

fn proposal_schema() -> serde_json::Value {
    serde_json::json!({
        "items": {
            "type": "object",
            "properties": {
                "fields": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "kind": { "type": "string", "enum": ["required", "expected", "discoverable"] },
                            "type": { "type": "string" },
                            "enum_values": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["name", "kind", "type"],
                        "additionalProperties": false,
                        "unevaluatedProperties": false
                    }
                }
            },
            "required": ["fields"],
            "additionalProperties": false,
            "unevaluatedProperties": false
        }
    })
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

fn parse_field_kind(s: &str) -> Option<FieldKind> {
    match s {
        "required" => Some(FieldKind::Required),
        "expected" => Some(FieldKind::Expected),
        "discoverable" => Some(FieldKind::Discoverable),
        _ => None,
    }
}

/// Generates a `SchemaContract` for `(query, content_sample)`, or `None`
/// on abstention — callers fall back to [`default_contract`].
pub async fn generate(
    model: &dyn ModelClient,
    query: &str,
    content_sample: &str,
    seed: u64,
    timestamp: impl Into<String>,
) -> Result<Option<SchemaContract>> {
    let mode = select_mode(query);
    let invocation = Invocation {
        stage: Stage::Contract,
        system_prompt: "Propose a conservative field contract for structured extraction. \
            Required fields are limited to identifiers the query clearly needs. \
            Expected fields cover common attributes of the inferred entity type. \
            Include a discoverable field only if the query is exploratory."
            .to_string(),
        user_prompt: format!("query: {query}\ncontent sample:\n{content_sample}"),
        schema_name: "contract_fields".to_string(),
        schema: proposal_schema(),
        budget: Stage::Contract.default_budget(),
        seed,
    };

    let result = model.invoke(invocation).await?;
    if result.abstained {
        return Ok(None);
    }

    let Some(output) = result.output else {
        return Ok(None);
    };

    let proposed: ProposedFields = serde_json::from_value(output)
        .map_err(|e| AtlasError::ContractAbstain { reason: format!("malformed proposal: {e}") })?;

    let mut fields = Vec::new();
    for proposed_field in proposed.fields {
        let Some(field_type) = parse_field_type(&proposed_field.field_type) else { continue };
        let Some(kind) = parse_field_kind(&proposed_field.kind) else { continue };
        let mut spec = FieldSpec::new(proposed_field.name, kind, field_type);
        spec.enum_values = proposed_field.enum_values;
        fields.push(spec);
    }

    if fields.is_empty() {
        return Ok(None);
    }

    let governance = Governance::default();
    let evidence_policy = EvidencePolicy::default();
    let contract_id = SchemaContract::compute_id(GENERATOR_NAME, seed, mode, &fields, &governance, &evidence_policy);

    Ok(Some(SchemaContract {
        contract_id,
        contract_version: CONTRACT_VERSION,
        generator: GENERATOR_NAME.to_string(),
        seed,
        timestamp: timestamp.into(),
        mode,
        fields,
        governance,
        evidence_policy,
        missing_policy: MissingPolicy::default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exploratory_queries_select_soft_mode() {
        assert_eq!(select_mode("list all volunteer opportunities"), Mode::Soft);
        assert_eq!(select_mode("extract the contact email"), Mode::Soft);
    }

    #[test]
    fn specific_queries_select_strict_mode() {
        assert_eq!(select_mode("what is the CEO's name?"), Mode::Strict);
    }

    #[test]
    fn default_contract_is_deterministic_for_a_seed() {
        let a = default_contract(7, "2026-01-01T00:00:00Z");
        let b = default_contract(7, "2026-06-01T00:00:00Z");
        assert_eq!(a.contract_id, b.contract_id);
    }

    #[tokio::test]
    async fn abstention_yields_none() {
        struct Abstaining;
        #[async_trait::async_trait]
        impl ModelClient for Abstaining {
            async fn invoke(&self, _invocation: Invocation) -> Result<crate::model::InvocationResult> {
                Ok(crate::model::InvocationResult::abstain(0, 0, std::time::Duration::from_millis(1)))
            }
        }
        let result = generate(&Abstaining, "list things", "<html></html>", 1, "2026-01-01T00:00:00Z")
            .await
            .unwrap();
        assert!(result.is_none());
    }
}
