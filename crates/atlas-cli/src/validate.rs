//! `atlas-cli validate <bundle>`: checks a previously emitted response
//! bundle (`{output_schema, data}`) for conformance to its own echoed
//! schema — a drift check, not a replay of extraction.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

pub fn validate_bundle(path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let bundle: Value = serde_json::from_str(&raw).context("bundle is not valid JSON")?;

    let schema = bundle.get("output_schema").context("bundle missing `output_schema`")?;
    let data = bundle.get("data").context("bundle missing `data`")?;

    conforms(data, schema)
}

fn conforms(data: &Value, schema: &Value) -> Result<()> {
    let items = data.as_array().context("`data` must be a JSON array")?;
    let min_items = schema.get("minItems").and_then(Value::as_u64).unwrap_or(0);
    if (items.len() as u64) < min_items {
        bail!("`data` has {} items, schema requires at least {}", items.len(), min_items);
    }

    let item_schema = schema.get("items").context("schema missing `items`")?;
    let properties = item_schema.get("properties").and_then(Value::as_object).context("schema missing `items.properties`")?;
    let required: Vec<&str> = item_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let additional_allowed = item_schema.get("additionalProperties").and_then(Value::as_bool).unwrap_or(true);

    for (index, item) in items.iter().enumerate() {
        let object = item.as_object().with_context(|| format!("entity {index} is not an object"))?;

        for field in &required {
            if !object.contains_key(*field) {
                bail!("entity {index} is missing required field '{field}'");
            }
        }

        if !additional_allowed {
            for key in object.keys() {
                if !properties.contains_key(key) {
                    bail!("entity {index} has field '{key}' not declared in the schema");
                }
            }
        }
    }

    Ok(())
}
