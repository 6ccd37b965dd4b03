//! Job Manager (C10): accepts a request, derives an idempotency key,
//! checks the cache, orchestrates the pipeline under the concurrency and
//! budget model of §5, persists state transitions, and emits telemetry.

use crate::cache::Cache;
use atlas_core::pipeline::{augmentation, contract, deterministic, executor, negotiate};
use atlas_core::types::content_hash;
use atlas_core::{
    AnchorIndex, AtlasError, EvidenceSummary, FetchOptions, FetchOutcome, IdempotencyKey, Job,
    JobCost, JobInput, JobState, ModelClient, Result, SchemaContract, Strategy, StrategyKind,
    TelemetryEnvelope, TelemetryEvent, Timings,
};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// The full response shape from §6: a negotiated output schema, the
/// extracted entities, and the metadata block every caller can trust.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobResponse {
    pub contract_id: String,
    pub mode: String,
    pub output_schema: serde_json::Value,
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    pub evidence: Vec<Vec<atlas_core::FieldEvidence>>,
    pub metadata: JobResponseMetadata,
    pub status: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct JobResponseMetadata {
    pub correlation_id: String,
    pub content_hash: String,
    pub cost: JobCost,
    pub timings: Timings,
    pub rows_dropped_count: u32,
    pub fields_omitted: Vec<String>,
    pub evidence_summary: EvidenceSummary,
}

fn query_hash(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hex::encode(hasher.finalize())
}

fn emit(correlation_id: &str, sequence: &AtomicU64, event: TelemetryEvent) {
    let envelope = TelemetryEnvelope { correlation_id: correlation_id.to_string(), sequence: sequence.fetch_add(1, Ordering::SeqCst), event };
    tracing::info!(target: "atlas_codex::telemetry", event = envelope.event.name(), correlation_id = %envelope.correlation_id, sequence = envelope.sequence, "{:?}", envelope.event);
}

/// Orchestrates one job end to end. Holds the process-wide worker-pool
/// semaphore and cache; a single instance is shared across concurrent
/// `run` calls.
pub struct JobManager {
    semaphore: Arc<Semaphore>,
    cache: Arc<Cache>,
    strategies: Vec<Arc<dyn Strategy>>,
}

impl JobManager {
    pub fn new(max_concurrent: usize, cache: Arc<Cache>, strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_concurrent)), cache, strategies }
    }

    pub async fn run(&self, model: &dyn ModelClient, input: JobInput) -> Result<JobResponse> {
        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");

        let correlation_id = uuid::Uuid::new_v4().to_string();
        let sequence = AtomicU64::new(0);
        let mut job = Job::new(uuid::Uuid::new_v4().to_string(), correlation_id.clone(), input.clone());
        let mut timings = Timings::default();
        let started = Instant::now();

        job.transition(JobState::Queued, None);
        job.transition(JobState::Acquiring, None);

        let acquire_started = Instant::now();
        let fetch_outcome = self.acquire(&input).await?;
        timings.acquire_ms = acquire_started.elapsed().as_millis() as u64;

        job.transition(JobState::Anchoring, None);
        let anchor_started = Instant::now();
        let index = AnchorIndex::build(&fetch_outcome.html);
        let hash = content_hash(&fetch_outcome.html);
        self.cache.put_anchor_digest(hash.clone(), format!("{}-anchors", index.len()));
        timings.anchor_ms = anchor_started.elapsed().as_millis() as u64;

        job.content_hash = Some(hash.clone());

        job.transition(JobState::Contracting, None);
        let contract_started = Instant::now();
        let qhash = query_hash(&input.query);
        let contract = match self.cache.get_contract(&qhash, &hash) {
            Some(Some(cached)) => {
                emit(&correlation_id, &sequence, TelemetryEvent::CacheHit { namespace: "contract".into(), key: format!("{qhash}/{hash}") });
                cached
            }
            Some(None) => {
                emit(&correlation_id, &sequence, TelemetryEvent::CacheHit { namespace: "contract".into(), key: format!("{qhash}/{hash}") });
                contract::default_contract(contract_seed(&qhash, &hash), now_rfc3339())
            }
            None => {
                let sample = index.build_samples(5);
                let sample_text: Vec<String> = sample.iter().filter_map(|id| index.text_of(id).map(str::to_string)).collect();
                let generated = contract::generate(model, &input.query, &sample_text.join("\n"), contract_seed(&qhash, &hash), now_rfc3339()).await?;
                match generated {
                    Some(contract) => {
                        self.cache.put_contract(qhash, hash.clone(), contract.clone());
                        contract
                    }
                    None => {
                        self.cache.put_abstain(qhash, hash.clone());
                        contract::default_contract(contract_seed(&qhash, &hash), now_rfc3339())
                    }
                }
            }
        };
        timings.contract_ms = contract_started.elapsed().as_millis() as u64;
        job.contract_id = Some(contract.contract_id.clone());
        job.mode = Some(contract.mode);
        emit(&correlation_id, &sequence, TelemetryEvent::ContractGenerated {
            contract_id: contract.contract_id.clone(),
            mode: format!("{:?}", contract.mode).to_lowercase(),
            field_count: contract.fields.len() as u32,
        });

        let idempotency_key = IdempotencyKey::compute(&input.url, &input.query, &hash, &contract.contract_id);
        job.idempotency_key = Some(idempotency_key.clone());
        if let Some(cached) = self.cache.get_result(&idempotency_key.0) {
            emit(&correlation_id, &sequence, TelemetryEvent::CacheHit { namespace: "result".into(), key: idempotency_key.0.clone() });
            job.transition(JobState::Success, None);
            return Ok(self.to_response(&correlation_id, &hash, &contract, cached, EvidenceSummary::default()));
        }

        job.transition(JobState::TwoTrack, None);
        let deterministic_started = Instant::now();
        let augmentation_started = Instant::now();
        let deterministic_findings = deterministic::run(&index, &contract.fields);
        let augmentation_result = augmentation::run(
            model,
            &index,
            &deterministic_findings,
            &contract.fields,
            &contract.evidence_policy,
            contract_seed(&qhash, &hash),
        )
        .await?;
        timings.deterministic_ms = deterministic_started.elapsed().as_millis() as u64;
        timings.augmentation_ms = augmentation_started.elapsed().as_millis() as u64;
        emit(&correlation_id, &sequence, TelemetryEvent::DeterministicPass {
            hits: deterministic_findings.hits.len() as u32,
            misses: deterministic_findings.misses.len() as u32,
            candidates: deterministic_findings.candidates.len() as u32,
        });
        emit(&correlation_id, &sequence, TelemetryEvent::LlmAugmentation {
            completions: augmentation_result.completions.len() as u32,
            proposals: augmentation_result.new_field_proposals.len() as u32,
            abstained: augmentation_result.completions.is_empty() && augmentation_result.new_field_proposals.is_empty(),
        });

        job.transition(JobState::Negotiating, None);
        let negotiate_started = Instant::now();
        let negotiation = negotiate::negotiate(&contract.fields, &deterministic_findings, &augmentation_result, &contract.governance);
        timings.negotiate_ms = negotiate_started.elapsed().as_millis() as u64;
        emit(&correlation_id, &sequence, TelemetryEvent::ContractValidation {
            valid: negotiation.status == atlas_core::NegotiationStatus::Success,
            detail: negotiation.reason.clone(),
        });

        if negotiation.status != atlas_core::NegotiationStatus::Success {
            job.transition(JobState::Failure, negotiation.reason.clone());
            emit(&correlation_id, &sequence, TelemetryEvent::JobCompleted { status: "failure".into(), duration_ms: started.elapsed().as_millis() as u64 });
            return Err(AtlasError::ValidationFail {
                detail: negotiation.reason.unwrap_or_else(|| "schema negotiation failed".into()),
            });
        }

        job.transition(JobState::Extracting, None);
        let extract_started = Instant::now();
        let execution = executor::execute(
            &index,
            &negotiation.final_schema,
            &deterministic_findings,
            &augmentation_result,
            contract.mode,
            &input.options.allowed_pii,
        )?;
        timings.extract_ms = extract_started.elapsed().as_millis() as u64;

        job.transition(JobState::Finalizing, None);
        let result = atlas_core::ExtractionResult {
            contract_id: contract.contract_id.clone(),
            mode: contract.mode,
            data: execution.data,
            evidence: execution.evidence,
            dropped_entities_count: execution.dropped_entities_count,
            fields_omitted: execution.fields_omitted,
            per_field_support: execution.per_field_support,
            cost: job.cost,
            timings,
        };
        self.cache.put_result(idempotency_key.0, result.clone());

        job.transition(JobState::Success, None);
        emit(&correlation_id, &sequence, TelemetryEvent::JobCompleted { status: "success".into(), duration_ms: started.elapsed().as_millis() as u64 });

        Ok(self.to_response(&correlation_id, &hash, &contract, result, negotiation.evidence_summary))
    }

    async fn acquire(&self, input: &JobInput) -> Result<FetchOutcome> {
        let chain = atlas_core::strategy::predefined_chain(
            input.options.chain_type.as_deref().unwrap_or("balanced"),
        )
        .unwrap_or_else(|| atlas_core::strategy::predefined_chain("fast").expect("fast chain always defined"));

        let strategy_refs: Vec<&dyn Strategy> = self.strategies.iter().map(|s| s.as_ref()).collect();
        let emergency = self
            .strategies
            .iter()
            .find(|s| s.kind() == StrategyKind::StaticFetch)
            .or_else(|| self.strategies.first())
            .ok_or_else(|| AtlasError::AllStrategiesFailed { detail: "no strategies configured".into() })?;

        atlas_core::strategy::acquire(
            &chain,
            &strategy_refs,
            emergency.as_ref(),
            &input.url,
            &FetchOptions { preferred_strategy: input.options.preferred_strategy.clone() },
            |html| !AnchorIndex::build(html).is_empty(),
        )
        .await
    }

    fn to_response(
        &self,
        correlation_id: &str,
        content_hash: &str,
        contract: &SchemaContract,
        result: atlas_core::ExtractionResult,
        evidence_summary: EvidenceSummary,
    ) -> JobResponse {
        JobResponse {
            contract_id: result.contract_id.clone(),
            mode: format!("{:?}", result.mode).to_lowercase(),
            output_schema: contract.output_schema(),
            data: result.data,
            evidence: result.evidence,
            metadata: JobResponseMetadata {
                correlation_id: correlation_id.to_string(),
                content_hash: content_hash.to_string(),
                cost: result.cost,
                timings: result.timings,
                rows_dropped_count: result.dropped_entities_count,
                fields_omitted: result.fields_omitted,
                evidence_summary,
            },
            status: "success".to_string(),
        }
    }
}

fn contract_seed(query_hash: &str, content_hash: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(query_hash.as_bytes());
    hasher.update(content_hash.as_bytes());
    let digest = hasher.finalize();
    u64::from_le_bytes(digest[0..8].try_into().unwrap())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
