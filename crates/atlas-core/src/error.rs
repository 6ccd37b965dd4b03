//! Error taxonomy (§7). Every variant carries enough detail to serialize
//! into `metadata.error` at the ingress boundary; stage and correlation id
//! are attached by callers at the point of construction.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AtlasError>;

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("E_CONTRACT_ABSTAIN: contract generator could not safely propose a contract: {reason}")]
    ContractAbstain { reason: String },

    #[error("E_VALIDATION_FAIL: output violates the negotiated schema: {detail}")]
    ValidationFail { detail: String },

    #[error("E_ANCHOR_MISS: model-proposed value failed cross-validation: {anchor_id} ({reason})")]
    AnchorMiss { anchor_id: String, reason: String },

    #[error("E_BUDGET_EXCEEDED: stage {stage} exceeded its token budget ({used}/{limit})")]
    BudgetExceeded { stage: String, used: u32, limit: u32 },

    #[error("E_TIMEOUT_STAGE: stage {stage} exceeded its time budget ({elapsed_ms}ms/{limit_ms}ms)")]
    TimeoutStage { stage: String, elapsed_ms: u64, limit_ms: u64 },

    #[error("E_PROMOTION_DENIED: discoverable field '{field}' failed quorum ({support_count}/{min_support}, {block_count}/{min_blocks})")]
    PromotionDenied { field: String, support_count: u32, min_support: u32, block_count: u32, min_blocks: u32 },

    #[error("E_STRICT_MODE_DROP: all entities dropped in strict mode; selectors tried: {selectors_tried:?}")]
    StrictModeDrop { selectors_tried: Vec<String>, counts: Vec<u32> },

    #[error("E_FALLBACK_USED: acquisition strategy fell back from {from} to {to}")]
    FallbackUsed { from: String, to: String },

    #[error("E_ALL_STRATEGIES_FAILED: emergency fallback also failed: {detail}")]
    AllStrategiesFailed { detail: String },

    #[error("E_CACHE_MISS: {namespace}/{key}")]
    CacheMiss { namespace: String, key: String },

    /// A single acquisition attempt failed before any chain-level
    /// verdict was reached. Carries `outcome` so `strategy::classify`
    /// can tell a transient transport failure from a permanent block
    /// without re-parsing `detail`.
    #[error("acquisition attempt failed via {strategy}: {detail}")]
    AcquisitionAttemptFailed {
        strategy: String,
        outcome: crate::types::AttemptOutcome,
        detail: String,
    },

    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    #[error("model client error: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("job cancelled")]
    Cancelled,
}

impl AtlasError {
    /// The taxonomy code this variant corresponds to, as it appears in
    /// `metadata.error.code`. Variants without a dedicated code in §7 map
    /// to the closest umbrella.
    pub fn code(&self) -> &'static str {
        match self {
            AtlasError::ContractAbstain { .. } => "E_CONTRACT_ABSTAIN",
            AtlasError::ValidationFail { .. } => "E_VALIDATION_FAIL",
            AtlasError::AnchorMiss { .. } => "E_ANCHOR_MISS",
            AtlasError::BudgetExceeded { .. } => "E_BUDGET_EXCEEDED",
            AtlasError::TimeoutStage { .. } => "E_TIMEOUT_STAGE",
            AtlasError::PromotionDenied { .. } => "E_PROMOTION_DENIED",
            AtlasError::StrictModeDrop { .. } => "E_STRICT_MODE_DROP",
            AtlasError::FallbackUsed { .. } => "E_FALLBACK_USED",
            AtlasError::AllStrategiesFailed { .. } => "E_ALL_STRATEGIES_FAILED",
            AtlasError::CacheMiss { .. } => "E_CACHE_MISS",
            AtlasError::Security(_) | AtlasError::Model(_) | AtlasError::Json(_) => "E_VALIDATION_FAIL",
            AtlasError::Cancelled => "E_VALIDATION_FAIL",
            AtlasError::AcquisitionAttemptFailed { .. } => "E_VALIDATION_FAIL",
        }
    }

    /// Fatal errors surface directly to the caller (§7 propagation
    /// policy); everything else recovers locally (strategy fallback,
    /// contract abstention, single retry).
    pub fn is_fatal(&self) -> bool {
        matches!(self, AtlasError::StrictModeDrop { .. } | AtlasError::AllStrategiesFailed { .. })
    }
}

/// SSRF and scheme-validation errors from the strategy layer (C9),
/// carried over essentially unchanged from the donor's crawler security
/// model.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("disallowed scheme: {scheme}")]
    DisallowedScheme { scheme: String },

    #[error("blocked host: {host}")]
    BlockedHost { host: String },

    #[error("blocked cidr: {ip} matches {cidr}")]
    BlockedCidr { ip: String, cidr: String },

    #[error("url has no host")]
    NoHost,

    #[error("dns resolution failed: {0}")]
    DnsResolution(String),

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_taxonomy() {
        assert_eq!(AtlasError::ContractAbstain { reason: "x".into() }.code(), "E_CONTRACT_ABSTAIN");
        assert_eq!(
            AtlasError::StrictModeDrop { selectors_tried: vec![], counts: vec![] }.code(),
            "E_STRICT_MODE_DROP"
        );
    }

    #[test]
    fn only_strict_drop_and_all_strategies_failed_are_fatal() {
        assert!(AtlasError::StrictModeDrop { selectors_tried: vec![], counts: vec![] }.is_fatal());
        assert!(AtlasError::AllStrategiesFailed { detail: "x".into() }.is_fatal());
        assert!(!AtlasError::ContractAbstain { reason: "x".into() }.is_fatal());
    }
}
