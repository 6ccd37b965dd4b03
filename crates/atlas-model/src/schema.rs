//! JSON-schema normalization for strict-mode structured output.
//!
//! Callers build schemas dynamically (from a field list negotiated at
//! runtime, not a static Rust type), so this module works on
//! `serde_json::Value` rather than deriving schemas via `schemars`.

use serde_json::Value;

/// Recursively set `additionalProperties: false` on every object schema.
///
/// Providers that enforce strict JSON-schema mode reject schemas missing
/// this, so callers should run every caller-built schema through here
/// before sending it.
pub fn ensure_no_additional_properties(value: &mut Value) {
    if let Value::Object(map) = value {
        if map.get("type") == Some(&Value::String("object".to_string())) {
            map.insert("additionalProperties".to_string(), Value::Bool(false));
        }
        for v in map.values_mut() {
            ensure_no_additional_properties(v);
        }
    } else if let Value::Array(arr) = value {
        for item in arr.iter_mut() {
            ensure_no_additional_properties(item);
        }
    }
}
