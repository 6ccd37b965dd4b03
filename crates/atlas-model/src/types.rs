//! Request and response types for OpenAI-compatible chat completions.

use serde::{Deserialize, Serialize};

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role: "system", "user", "assistant"
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// A structured-output completion request: a system/user prompt pair
/// constrained to a caller-supplied JSON schema.
///
/// Deterministic by construction: `temperature` defaults to `0.0` and
/// `seed`, when set, is forwarded to the provider so repeated calls with
/// the same prompt and schema are stable.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    pub response_format: ResponseFormat,
}

impl StructuredCompletionRequest {
    /// Build a deterministic structured-output request: temperature 0.0,
    /// strict JSON-schema response format.
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
        schema_name: impl Into<String>,
        schema: serde_json::Value,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::system(system), Message::user(user)],
            temperature: Some(0.0),
            seed: None,
            max_tokens: None,
            response_format: ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: schema_name.into(),
                    strict: true,
                    schema,
                },
            },
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub strict: bool,
    pub schema: serde_json::Value,
}

/// Parsed result of a structured completion call.
#[derive(Debug, Clone)]
pub struct StructuredCompletionResponse {
    /// Raw JSON content emitted by the model, still a string at this layer
    /// — callers decide how to parse and validate it.
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseRaw {
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessageResponse {
    pub content: String,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Strip markdown code fences some providers still wrap JSON output in.
pub fn strip_code_blocks(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_request_defaults_to_deterministic_temperature() {
        let req = StructuredCompletionRequest::new(
            "gpt-4o",
            "system",
            "user",
            "schema",
            serde_json::json!({"type": "object"}),
        );
        assert_eq!(req.temperature, Some(0.0));
        assert!(req.response_format.json_schema.strict);
    }

    #[test]
    fn with_seed_sets_seed() {
        let req = StructuredCompletionRequest::new(
            "gpt-4o",
            "s",
            "u",
            "schema",
            serde_json::json!({}),
        )
        .with_seed(7);
        assert_eq!(req.seed, Some(7));
    }

    #[test]
    fn strip_code_blocks_removes_fences() {
        assert_eq!(strip_code_blocks("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("```\n{}\n```"), "{}");
        assert_eq!(strip_code_blocks("{}"), "{}");
    }
}
