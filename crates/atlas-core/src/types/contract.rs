//! The `SchemaContract`: the deterministic, per-request description of
//! what fields may appear in output and under what policy.

use super::field::FieldSpec;
use super::job::Mode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Governance {
    pub allow_new_fields: bool,
    pub min_support_threshold: u32,
    pub min_blocks_threshold: u32,
    pub max_discoverable_fields: u32,
}

impl Default for Governance {
    fn default() -> Self {
        Self {
            allow_new_fields: true,
            min_support_threshold: 5,
            min_blocks_threshold: 3,
            max_discoverable_fields: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvidencePolicy {
    pub require_anchors: bool,
    pub min_anchors_per_field: u32,
}

impl Default for EvidencePolicy {
    fn default() -> Self {
        Self { require_anchors: true, min_anchors_per_field: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredMissingPolicy {
    DropEntity,
    FailJob,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedMissingPolicy {
    OmitField,
    NullField,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MissingPolicy {
    pub required: RequiredMissingPolicy,
    pub expected: ExpectedMissingPolicy,
}

impl Default for MissingPolicy {
    fn default() -> Self {
        Self {
            required: RequiredMissingPolicy::DropEntity,
            expected: ExpectedMissingPolicy::OmitField,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaContract {
    pub contract_id: String,
    pub contract_version: u32,
    pub generator: String,
    pub seed: u64,
    pub timestamp: String,
    pub mode: Mode,
    pub fields: Vec<FieldSpec>,
    pub governance: Governance,
    pub evidence_policy: EvidencePolicy,
    pub missing_policy: MissingPolicy,
}

impl SchemaContract {
    /// Deterministic `contract_id`: sha-256 over the canonical payload
    /// with the timestamp excluded, so re-deriving the same contract
    /// twice (invariant I3) never depends on wall-clock time.
    pub fn compute_id(
        generator: &str,
        seed: u64,
        mode: Mode,
        fields: &[FieldSpec],
        governance: &Governance,
        evidence_policy: &EvidencePolicy,
    ) -> String {
        let canonical = serde_json::json!({
            "generator": generator,
            "seed": seed,
            "mode": mode,
            "fields": fields,
            "governance": governance,
            "evidence_policy": evidence_policy,
        });
        let canonical_str = serde_json::to_string(&canonical).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical_str.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Assemble the strict JSON Schema (`additionalProperties: false`,
    /// `unevaluatedProperties: false`, `minItems >= 1` on the array root)
    /// the extraction executor and caller both validate against.
    pub fn output_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            properties.insert(field.name.clone(), field.field_type.json_schema_type());
            if field.kind == super::field::FieldKind::Required {
                required.push(field.name.clone());
            }
        }
        serde_json::json!({
            "type": "array",
            "minItems": 1,
            "items": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
                "unevaluatedProperties": false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::field::{FieldKind, FieldType};

    #[test]
    fn contract_id_is_deterministic_over_canonical_payload() {
        let fields = vec![FieldSpec::new("name", FieldKind::Required, FieldType::String)];
        let governance = Governance::default();
        let policy = EvidencePolicy::default();
        let id_a = SchemaContract::compute_id("c6", 7, Mode::Strict, &fields, &governance, &policy);
        let id_b = SchemaContract::compute_id("c6", 7, Mode::Strict, &fields, &governance, &policy);
        assert_eq!(id_a, id_b);
    }

    #[test]
    fn contract_id_changes_with_fields() {
        let governance = Governance::default();
        let policy = EvidencePolicy::default();
        let a = vec![FieldSpec::new("name", FieldKind::Required, FieldType::String)];
        let b = vec![FieldSpec::new("title", FieldKind::Required, FieldType::String)];
        let id_a = SchemaContract::compute_id("c6", 7, Mode::Strict, &a, &governance, &policy);
        let id_b = SchemaContract::compute_id("c6", 7, Mode::Strict, &b, &governance, &policy);
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn output_schema_rejects_additional_properties() {
        let contract = SchemaContract {
            contract_id: "x".into(),
            contract_version: 1,
            generator: "c6".into(),
            seed: 0,
            timestamp: "2026-01-01T00:00:00Z".into(),
            mode: Mode::Strict,
            fields: vec![FieldSpec::new("name", FieldKind::Required, FieldType::String)],
            governance: Governance::default(),
            evidence_policy: EvidencePolicy::default(),
            missing_policy: MissingPolicy::default(),
        };
        let schema = contract.output_schema();
        assert_eq!(schema["items"]["additionalProperties"], false);
        assert_eq!(schema["minItems"], 1);
        assert_eq!(schema["items"]["required"][0], "name");
    }
}
