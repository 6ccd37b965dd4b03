//! Concrete [`crate::model::ModelClient`] backends. Gated behind the
//! `openai` feature so `atlas-core` can be built without pulling in
//! `atlas-model` and its HTTP stack.

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAiModelClient;
