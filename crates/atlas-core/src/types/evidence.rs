//! GDPR-safe evidence records: output fields never carry raw DOM handles
//! or unredacted PII past this boundary.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Field types treated as PII for redaction purposes unless named in
/// `options.allowed_pii`.
pub const PII_FIELD_TYPES: &[&str] = &["email", "phone", "address"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub anchor_id: String,
    /// Present only inside the process; never serialized to a caller
    /// outside the anchor index's owning job.
    #[serde(skip_serializing)]
    pub selector: Option<String>,
    pub text_sha256: String,
    pub redaction_mask: Option<String>,
}

/// One assembled entity's evidence trail, one record per populated
/// field — `data` always carries the real extracted value, `evidence`
/// is the only channel a PII field's raw text can be withheld from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEvidence {
    pub field: String,
    pub record: EvidenceRecord,
}

impl EvidenceRecord {
    /// Build an evidence record for a field value. PII field kinds are
    /// hashed and masked unless `allow_plaintext` (caller opted in via
    /// `options.allowedPII`) is set.
    pub fn new(anchor_id: impl Into<String>, selector: impl Into<String>, text: &str, field_kind: &str, allow_plaintext: bool) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let text_sha256 = hex::encode(hasher.finalize());

        let is_pii = PII_FIELD_TYPES.contains(&field_kind);
        let redaction_mask = if is_pii && !allow_plaintext {
            Some(mask_for(field_kind))
        } else {
            None
        };

        Self { anchor_id: anchor_id.into(), selector: Some(selector.into()), text_sha256, redaction_mask }
    }
}

fn mask_for(field_kind: &str) -> String {
    format!("[redacted:{field_kind}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pii_fields_are_masked_by_default() {
        let record = EvidenceRecord::new("n_1", ".email", "a@example.com", "email", false);
        assert!(record.redaction_mask.is_some());
    }

    #[test]
    fn allowed_pii_skips_masking() {
        let record = EvidenceRecord::new("n_1", ".email", "a@example.com", "email", true);
        assert!(record.redaction_mask.is_none());
    }

    #[test]
    fn non_pii_fields_never_masked() {
        let record = EvidenceRecord::new("n_1", ".name", "Ada Lovelace", "string", false);
        assert!(record.redaction_mask.is_none());
    }
}
