//! Field specifications: the vocabulary a contract is built from.

use serde::{Deserialize, Serialize};

/// Governs whether a missing value drops an entity, prunes the field, or
/// is simply never proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Required,
    Expected,
    Discoverable,
    Optional,
}

/// Declared value type, each backed by exactly one validator in
/// [`crate::detect::validators`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    String,
    Email,
    Url,
    Enum,
    Richtext,
    Number,
    Boolean,
    Date,
    ArrayOfString,
}

impl FieldType {
    /// JSON Schema `type` (and `items.type` for the array case) for this
    /// field type, used when assembling `SchemaContract.output_schema`.
    pub fn json_schema_type(self) -> serde_json::Value {
        match self {
            FieldType::String | FieldType::Email | FieldType::Url | FieldType::Enum
            | FieldType::Richtext | FieldType::Date => serde_json::json!({ "type": "string" }),
            FieldType::Number => serde_json::json!({ "type": "number" }),
            FieldType::Boolean => serde_json::json!({ "type": "boolean" }),
            FieldType::ArrayOfString => {
                serde_json::json!({ "type": "array", "items": { "type": "string" } })
            }
        }
    }
}

/// One field in a contract: name, kind, type, and the detector/validator
/// pipeline used to locate and check it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub field_type: FieldType,
    #[serde(default)]
    pub detectors: Vec<String>,
    pub extractor: Option<String>,
    #[serde(default)]
    pub validators: Vec<String>,
    pub min_support: Option<u32>,
    /// Allowed members, only meaningful when `field_type` is `Enum`.
    #[serde(default)]
    pub enum_values: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            kind,
            field_type,
            detectors: Vec::new(),
            extractor: None,
            validators: Vec::new(),
            min_support: None,
            enum_values: Vec::new(),
        }
    }

    pub fn with_detectors(mut self, detectors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.detectors = detectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validators(mut self, validators: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.validators = validators.into_iter().map(Into::into).collect();
        self
    }

    pub fn required(self) -> bool {
        self.kind == FieldKind::Required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_of_string_schema_shape() {
        let schema = FieldType::ArrayOfString.json_schema_type();
        assert_eq!(schema["type"], "array");
        assert_eq!(schema["items"]["type"], "string");
    }
}
