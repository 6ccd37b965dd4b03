//! Error types for the model REST client.

use thiserror::Error;

/// Result type for model client operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors returned by the model REST client.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Configuration error (missing API key, invalid settings)
    #[error("configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// API error (non-2xx response, rate limit, invalid request)
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Parse error (invalid JSON, unexpected response shape)
    #[error("parse error: {0}")]
    Parse(String),
}
