//! Job lifecycle types: the unit of work owned and tracked by the job manager.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Request mode: strict drops entities missing a required field; soft
/// demotes under-supported required fields instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Strict,
    Soft,
}

/// `hash(url ∥ query ∥ normalized_content_hash ∥ contract_id)`.
///
/// Equal keys must return the same result without recomputation — the
/// result cache is keyed on this, not on `(url, query)` alone, because the
/// same request against changed content must not collide with a stale
/// answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    pub fn compute(url: &str, query: &str, content_hash: &str, contract_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(b"\0");
        hasher.update(query.as_bytes());
        hasher.update(b"\0");
        hasher.update(content_hash.as_bytes());
        hasher.update(b"\0");
        hasher.update(contract_id.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }
}

/// Terminal or in-flight job state. The state machine is defined in
/// [`Transition`]; this is the set of positions in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Queued,
    Acquiring,
    Anchoring,
    Contracting,
    TwoTrack,
    Negotiating,
    Extracting,
    Finalizing,
    Success,
    Failure,
    Abstained,
    Cancelled,
}

impl JobState {
    /// `Cancelled` is reachable from any non-terminal state; the other
    /// terminal states are reached only by the ordinary pipeline sequence.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Success | JobState::Failure | JobState::Abstained | JobState::Cancelled
        )
    }

    fn can_follow(self, from: JobState) -> bool {
        if self == JobState::Cancelled {
            return !from.is_terminal();
        }
        matches!(
            (from, self),
            (JobState::Created, JobState::Queued)
                | (JobState::Queued, JobState::Acquiring)
                | (JobState::Acquiring, JobState::Anchoring)
                | (JobState::Anchoring, JobState::Contracting)
                | (JobState::Contracting, JobState::TwoTrack)
                | (JobState::TwoTrack, JobState::Negotiating)
                | (JobState::Negotiating, JobState::Extracting)
                | (JobState::Extracting, JobState::Finalizing)
                | (
                    JobState::Finalizing,
                    JobState::Success | JobState::Failure | JobState::Abstained
                )
        )
    }
}

/// One entry in a job's append-only transition log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from: JobState,
    pub to: JobState,
    pub correlation_id: String,
    pub sequence: u64,
    pub detail: Option<String>,
}

/// Job input as received at ingress (§6 request shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInput {
    pub url: String,
    pub query: String,
    pub mode: Option<Mode>,
    pub max_pages: Option<u32>,
    pub budget: Option<JobBudget>,
    pub options: JobOptions,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JobBudget {
    pub tokens: Option<u32>,
    pub time_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    pub preferred_strategy: Option<String>,
    pub chain_type: Option<String>,
    pub emergency_fallback: Option<bool>,
    #[serde(default)]
    pub allowed_pii: Vec<String>,
}

/// Job cost accounting, accumulated across every model call and strategy
/// attempt for the job's lifetime.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobCost {
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// A job, owned exclusively by the job manager. `logs` is a bounded ring
/// — only the most recent `logs.capacity()` transitions are retained
/// in-process; the full append-only log is the persistence layer's job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub correlation_id: String,
    pub idempotency_key: Option<IdempotencyKey>,
    pub input: JobInput,
    pub content_hash: Option<String>,
    pub contract_id: Option<String>,
    pub mode: Option<Mode>,
    pub state: JobState,
    pub cost: JobCost,
    #[serde(skip)]
    pub transitions: Vec<Transition>,
}

impl Job {
    pub fn new(id: impl Into<String>, correlation_id: impl Into<String>, input: JobInput) -> Self {
        Self {
            id: id.into(),
            correlation_id: correlation_id.into(),
            idempotency_key: None,
            input,
            content_hash: None,
            contract_id: None,
            mode: None,
            state: JobState::Created,
            cost: JobCost::default(),
            transitions: Vec::new(),
        }
    }

    /// Apply a state transition, enforcing the state machine in §4.10.
    /// Returns `false` (and leaves state unchanged) on an illegal move.
    pub fn transition(&mut self, to: JobState, detail: Option<String>) -> bool {
        if !to.can_follow(self.state) {
            return false;
        }
        let sequence = self.transitions.len() as u64;
        self.transitions.push(Transition {
            from: self.state,
            to,
            correlation_id: self.correlation_id.clone(),
            sequence,
            detail,
        });
        self.state = to;
        true
    }

    pub fn elapsed_transitions(&self) -> &[Transition] {
        &self.transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> JobInput {
        JobInput {
            url: "https://example.com".into(),
            query: "extract names".into(),
            mode: None,
            max_pages: None,
            budget: None,
            options: JobOptions::default(),
        }
    }

    #[test]
    fn idempotency_key_is_deterministic() {
        let a = IdempotencyKey::compute("u", "q", "c", "id");
        let b = IdempotencyKey::compute("u", "q", "c", "id");
        assert_eq!(a, b);
    }

    #[test]
    fn idempotency_key_changes_with_content_hash() {
        let a = IdempotencyKey::compute("u", "q", "c1", "id");
        let b = IdempotencyKey::compute("u", "q", "c2", "id");
        assert_ne!(a, b);
    }

    #[test]
    fn legal_transitions_follow_the_pipeline_order() {
        let mut job = Job::new("j1", "corr1", input());
        assert!(job.transition(JobState::Queued, None));
        assert!(job.transition(JobState::Acquiring, None));
        assert!(!job.transition(JobState::Negotiating, None));
        assert_eq!(job.state, JobState::Acquiring);
    }

    #[test]
    fn cancellation_reachable_from_any_nonterminal_state() {
        let mut job = Job::new("j1", "corr1", input());
        job.transition(JobState::Queued, None);
        assert!(job.transition(JobState::Cancelled, Some("user request".into())));
        assert!(job.state.is_terminal());
    }

    #[test]
    fn transitions_are_sequentially_numbered() {
        let mut job = Job::new("j1", "corr1", input());
        job.transition(JobState::Queued, None);
        job.transition(JobState::Acquiring, None);
        let seqs: Vec<u64> = job.transitions.iter().map(|t| t.sequence).collect();
        assert_eq!(seqs, vec![0, 1]);
    }
}
