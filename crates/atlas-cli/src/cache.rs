//! In-memory content-hash and contract-id indexed cache (C11).
//!
//! Three namespaces: content (content-hash → parsed anchor digest),
//! contract ((query-hash, content-hash) → contract, with a short-TTL
//! negative entry for abstentions), and result (idempotency-key → final
//! extraction result). Entries are immutable once written; cache hits
//! skip all downstream computation.

use atlas_core::{ExtractionResult, SchemaContract};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Clone)]
enum ContractEntry {
    Contract(SchemaContract),
    Abstain { recorded_at: Instant },
}

/// In-memory cache for a single process. Not suitable for multi-process
/// deployment; a pluggable persistence interface (§6) would back this
/// with a shared store in production.
pub struct Cache {
    content: RwLock<HashMap<String, String>>,
    contract: RwLock<HashMap<(String, String), ContractEntry>>,
    result: RwLock<HashMap<String, ExtractionResult>>,
    abstain_ttl: Duration,
}

impl Cache {
    pub fn new(abstain_ttl: Duration) -> Self {
        Self {
            content: RwLock::new(HashMap::new()),
            contract: RwLock::new(HashMap::new()),
            result: RwLock::new(HashMap::new()),
            abstain_ttl,
        }
    }

    pub fn get_anchor_digest(&self, content_hash: &str) -> Option<String> {
        self.content.read().unwrap().get(content_hash).cloned()
    }

    pub fn put_anchor_digest(&self, content_hash: impl Into<String>, digest: impl Into<String>) {
        self.content.write().unwrap().insert(content_hash.into(), digest.into());
    }

    /// `None` means no entry; `Some(None)` means a live negative
    /// (abstention) entry; `Some(Some(contract))` means a cached contract.
    pub fn get_contract(&self, query_hash: &str, content_hash: &str) -> Option<Option<SchemaContract>> {
        let key = (query_hash.to_string(), content_hash.to_string());
        let mut contracts = self.contract.write().unwrap();
        match contracts.get(&key) {
            Some(ContractEntry::Contract(contract)) => Some(Some(contract.clone())),
            Some(ContractEntry::Abstain { recorded_at }) => {
                if recorded_at.elapsed() < self.abstain_ttl {
                    Some(None)
                } else {
                    contracts.remove(&key);
                    None
                }
            }
            None => None,
        }
    }

    pub fn put_contract(&self, query_hash: impl Into<String>, content_hash: impl Into<String>, contract: SchemaContract) {
        self.contract
            .write()
            .unwrap()
            .insert((query_hash.into(), content_hash.into()), ContractEntry::Contract(contract));
    }

    pub fn put_abstain(&self, query_hash: impl Into<String>, content_hash: impl Into<String>) {
        self.contract
            .write()
            .unwrap()
            .insert((query_hash.into(), content_hash.into()), ContractEntry::Abstain { recorded_at: Instant::now() });
    }

    pub fn get_result(&self, idempotency_key: &str) -> Option<ExtractionResult> {
        self.result.read().unwrap().get(idempotency_key).cloned()
    }

    pub fn put_result(&self, idempotency_key: impl Into<String>, result: ExtractionResult) {
        self.result.write().unwrap().insert(idempotency_key.into(), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::{JobCost, Mode, Timings};

    fn result() -> ExtractionResult {
        ExtractionResult {
            contract_id: "c1".into(),
            mode: Mode::Strict,
            data: Vec::new(),
            dropped_entities_count: 0,
            fields_omitted: Vec::new(),
            per_field_support: std::collections::HashMap::new(),
            cost: JobCost::default(),
            timings: Timings::default(),
        }
    }

    #[test]
    fn result_cache_roundtrips() {
        let cache = Cache::new(Duration::from_secs(3600));
        cache.put_result("idem1", result());
        assert!(cache.get_result("idem1").is_some());
        assert!(cache.get_result("idem2").is_none());
    }

    #[test]
    fn abstain_entry_expires_after_ttl() {
        let cache = Cache::new(Duration::from_millis(0));
        cache.put_abstain("q1", "c1");
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get_contract("q1", "c1").is_none());
    }

    #[test]
    fn live_abstain_entry_reports_as_negative_hit() {
        let cache = Cache::new(Duration::from_secs(3600));
        cache.put_abstain("q1", "c1");
        assert!(matches!(cache.get_contract("q1", "c1"), Some(None)));
    }
}
