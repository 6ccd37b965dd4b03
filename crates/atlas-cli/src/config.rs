//! Environment-driven configuration (A2), loaded once at process start.
//! Unrecognized environment variables are ignored.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// The minimum configuration set named in §6: model endpoint/key, worker
/// concurrency, strategy timeouts, cache TTLs, telemetry sink, redaction
/// policy.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub max_concurrent_jobs: usize,
    pub static_fetch_timeout: Duration,
    pub cache_abstain_ttl: Duration,
    pub telemetry_sink: TelemetrySink,
    pub allow_pii: Vec<String>,
    pub model_rate_limit_per_min: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetrySink {
    Stdout,
    Disabled,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            openai_api_key: env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?,
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            openai_model: env::var("OPENAI_MODEL").ok(),
            max_concurrent_jobs: env::var("ATLAS_MAX_CONCURRENT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("ATLAS_MAX_CONCURRENT must be a valid number")?,
            static_fetch_timeout: Duration::from_millis(
                env::var("ATLAS_STATIC_FETCH_TIMEOUT_MS")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .context("ATLAS_STATIC_FETCH_TIMEOUT_MS must be a valid number")?,
            ),
            cache_abstain_ttl: Duration::from_secs(
                env::var("ATLAS_CACHE_ABSTAIN_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .context("ATLAS_CACHE_ABSTAIN_TTL_SECS must be a valid number")?,
            ),
            telemetry_sink: match env::var("ATLAS_TELEMETRY_SINK").as_deref() {
                Ok("disabled") => TelemetrySink::Disabled,
                _ => TelemetrySink::Stdout,
            },
            allow_pii: env::var("ATLAS_ALLOWED_PII")
                .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
                .unwrap_or_default(),
            model_rate_limit_per_min: env::var("ATLAS_MODEL_RATE_LIMIT_PER_MIN")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("ATLAS_MODEL_RATE_LIMIT_PER_MIN must be a valid number")?,
        })
    }
}
