//! `seeker-runtime` – the search loop and everything that talks to the model.
//!
//! # Modules
//!
//! - [`search_loop`] – [`SearchLoop`][search_loop::SearchLoop]: the step
//!   orchestrator. Retrieval, hypothesis acquisition, gating, action
//!   simulation and perception, one [`StepRecord`][search_loop::StepRecord]
//!   per step.
//! - [`belief`] – [`BeliefController`][belief::BeliefController]: pure belief
//!   transitions (retrieval folding, decision bookkeeping, hysteresis and the
//!   completion guard).
//! - [`vlm_client`] – [`VlmClient`][vlm_client::VlmClient] over the
//!   [`VlmTransport`][vlm_client::VlmTransport] seam, with an Ollama
//!   `/api/generate` transport and a bounded repair-prompt retry.
//! - [`extractor`] – pulls one JSON object out of free-form model output.
//! - [`prompt`] – prompt and memory-context construction.
//! - [`fallback`] – the deterministic, always-valid hypothesis.
//! - [`mock`] – seeded stand-in for the model.
//! - [`demo`] – the five-room demo map.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: `tracing`
//!   subscriber with optional OTLP export.
//!
//! Nothing in this crate may set `target_status` to `visible` or `done`
//! except [`BeliefController::apply_perception`][belief::BeliefController::apply_perception].

pub mod belief;
pub mod demo;
pub mod extractor;
pub mod fallback;
pub mod mock;
pub mod prompt;
pub mod search_loop;
pub mod telemetry;
pub mod vlm_client;

pub use belief::{BeliefController, PerceptionUpdate};
pub use demo::seed_demo_store;
pub use extractor::extract_json_object;
pub use fallback::fallback_hypothesis;
pub use mock::mock_hypothesis;
pub use prompt::{MemoryContextEntry, PromptContext, build_memory_context, build_prompt};
pub use search_loop::{
    DecisionSink, HypothesisBackend, MemorySink, RunSummary, SearchLoop, SearchLoopConfig,
    StepMeta, StepRecord,
};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use vlm_client::{
    OllamaConfig, OllamaTransport, TransportError, VlmClient, VlmMeta, VlmProposal, VlmTransport,
};

// Re-exported so callers configuring a loop need no direct kernel or
// perception dependency.
pub use seeker_kernel::VerifierOdds;
pub use seeker_perception::{OracleConfig, PerceptionBackend, RelPoseEntry};
