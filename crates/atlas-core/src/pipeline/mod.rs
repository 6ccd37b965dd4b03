//! The two-track extraction pipeline: deterministic detection (C3),
//! model-augmented completion (C5), contract generation (C6), schema
//! negotiation (C7), and final assembly (C8).
//!
//! Orchestration (job lifecycle, concurrency, caching) lives one layer up
//! in `atlas-cli`'s Job Manager; this module is the pure per-job pipeline
//! it drives.

pub mod augmentation;
pub mod contract;
pub mod deterministic;
pub mod executor;
pub mod negotiate;

pub use executor::{execute, ExecutionOutput};
pub use negotiate::negotiate;
