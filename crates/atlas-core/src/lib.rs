//! # Atlas Codex Core
//!
//! An Evidence-First Extraction Core: a query-driven, schema-negotiating
//! web extraction library built so that the language model never
//! touches raw selectors or raw HTML. It sees anchor IDs and short text
//! samples; every value it proposes is re-verified against the DOM
//! before it can affect an output.
//!
//! ## Design Philosophy
//!
//! | Principle | Description |
//! |-----------|-------------|
//! | **Evidence-first** | Deterministic detectors run first; the model only augments what they miss |
//! | **Two-track extraction** | A deterministic track (C3) and a model-augmented track (C5) run side by side |
//! | **Cross-validated augmentation** | Every model claim must resolve to a real anchor and match its text |
//! | **Negotiated schema** | The contract a caller asks for and the schema a page can actually support are reconciled, not assumed equal |
//!
//! ## Architecture
//!
//! ```text
//! Strategy (C9) acquires HTML
//!   → Anchor Index (C1) parses it into block-scoped, addressable anchors
//!   → Contract Generator (C6) proposes required/expected/discoverable fields
//!   → Deterministic Track (C3) and Augmentation Track (C5) run independently
//!   → Schema Negotiator (C7) reconciles contract vs. findings into a final schema
//!   → Extraction Executor (C8) assembles the output array, enforcing strict/soft mode
//! ```
//!
//! ## Modules
//!
//! - [`types`] - the data model: jobs, contracts, findings, negotiation, evidence
//! - [`error`] - the error taxonomy (§7) and SSRF security errors
//! - [`anchor`] - the Anchor Index (C1): parses HTML into stable, addressable anchors
//! - [`detect`] - the detector library (C2) and field validators
//! - [`model`] - the uniform Model Client contract (C4): budgets, retries, abstention
//! - [`ai`] - the OpenAI-backed `ModelClient` implementation (feature `openai`)
//! - [`pipeline`] - C3, C5, C6, C7, C8: the deterministic and augmentation tracks, negotiation, and execution
//! - [`strategy`] - Strategy & Fallback (C9): content acquisition chains, SSRF validation, and strategy selection
//! - [`testing`] - mock implementations for testing

pub mod anchor;
pub mod detect;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod strategy;
pub mod testing;
pub mod types;

#[cfg(feature = "openai")]
pub mod ai;

pub use error::{AtlasError, Result, SecurityError};

pub use anchor::AnchorIndex;

pub use model::{Budget, Invocation, InvocationResult, ModelClient, Stage};

pub use pipeline::{execute, negotiate, ExecutionOutput};

pub use strategy::{FallbackChain, FetchOptions, FetchOutcome, Selector, Strategy, StrategyKind, UrlValidator};

pub use types::{
    AcquisitionMetadata, AttemptOutcome, AugmentationResult, Candidate, Changes, Completion, DeterministicFindings,
    EvidencePolicy, EvidenceRecord, EvidenceSummary, ExpectedMissingPolicy, ExtractionResult, FieldEvidence,
    FieldKind, FieldSpec, FieldType, Governance, Hit, IdempotencyKey, Job, JobBudget, JobCost,
    JobInput, JobOptions, JobState, MissReason, Miss, Mode, NegotiationResult, NegotiationStatus,
    NewFieldProposal, Normalization, RequiredMissingPolicy, SchemaContract, StrategyAttempt,
    TelemetryEnvelope, TelemetryEvent, Timings, Transition,
};

#[cfg(feature = "openai")]
pub use ai::OpenAiModelClient;
