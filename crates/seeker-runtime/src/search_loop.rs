//! [`SearchLoop`] – the step orchestrator.
//!
//! One [`step`][SearchLoop::step] runs, strictly in order:
//!
//! 1. **Retrieve** – rank memory nodes against the goal (skipped when the goal
//!    tokenizes to nothing) and fold the candidates into the belief.
//! 2. **Acquire** – obtain a raw hypothesis from the configured
//!    [`HypothesisBackend`]. The model path substitutes the fallback hypothesis
//!    whenever the client returns nothing usable.
//! 3. **Gate** – parse, validate and verify through the [`HypothesisGate`].
//! 4. **Decide & act** – record the outcome in the belief and simulate the
//!    chosen action.
//! 5. **Perceive** – ask the [`PerceptionGate`] about the post-action location
//!    and apply hysteresis and the completion guard.
//!
//! The belief contract is checked at construction and after every step; a
//! violation is a [`SeekerError::InvariantViolation`] and ends the run. Every
//! other failure (bad model output, service errors, perception faults) is
//! absorbed into the step and shows up only in its [`StepRecord`].
//!
//! All randomness flows through one [`RunRng`] seeded from
//! [`SearchLoopConfig::seed`], so two runs with the same configuration produce
//! identical belief trajectories.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicBool;
//! use seeker_memory::InMemoryNodeStore;
//! use seeker_runtime::search_loop::{MemorySink, SearchLoop, SearchLoopConfig};
//!
//! # async fn demo() -> Result<(), seeker_types::SeekerError> {
//! let mut search = SearchLoop::new(SearchLoopConfig::default(), Box::new(InMemoryNodeStore::new()))?;
//! let mut sink = MemorySink::default();
//! let summary = search.run(20, &mut sink, &AtomicBool::new(false)).await?;
//! println!("{} steps, final status {}", summary.steps_run, summary.final_status);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use seeker_kernel::{GateOutcome, HypothesisGate, RawHypothesis, RunRng, ValidationError, VerifierOdds, VlmStatus};
use seeker_memory::{DeterministicEmbedder, MemoryError, MemoryStore, retrieve_candidates, tokenize};
use seeker_perception::{OracleConfig, PerceptionBackend, PerceptionGate};
use seeker_types::{BeliefState, BeliefStatus, Candidate, Hypothesis, NodeId, SeekerError, VerifierResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::belief::{BeliefController, DEFAULT_HYSTERESIS_K, DEFAULT_MEMORY_THRESHOLD};
use crate::fallback::fallback_hypothesis;
use crate::mock::mock_hypothesis;
use crate::prompt::{PromptContext, build_memory_context};
use crate::vlm_client::{OllamaConfig, OllamaTransport, VlmClient, VlmMeta, VlmTransport};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Where raw hypotheses come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisBackend {
    /// Seeded generator mixing valid, invalid and unparseable output.
    #[default]
    Mock,
    /// External model over HTTP; fallback hypothesis on failure.
    Ollama,
    /// Model path disabled; the fallback hypothesis every step.
    Fallback,
}

impl HypothesisBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            HypothesisBackend::Mock => "mock",
            HypothesisBackend::Ollama => "ollama",
            HypothesisBackend::Fallback => "fallback",
        }
    }
}

impl fmt::Display for HypothesisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HypothesisBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(HypothesisBackend::Mock),
            "ollama" => Ok(HypothesisBackend::Ollama),
            "fallback" => Ok(HypothesisBackend::Fallback),
            other => Err(format!(
                "unknown backend '{other}' (expected mock, ollama or fallback)"
            )),
        }
    }
}

/// Configuration bundle for [`SearchLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchLoopConfig {
    pub goal_text: String,
    pub active_constraints: Vec<String>,
    /// Seed of the run's single random stream.
    pub seed: u64,
    /// Number of retrieval candidates kept per step.
    pub retrieval_k: usize,
    pub memory_threshold: f64,
    pub hysteresis_k: u32,
    pub backend: HypothesisBackend,
    /// End the run as soon as the belief reaches `done`.
    pub stop_on_done: bool,
    pub verifier_odds: VerifierOdds,
    pub perception_backend: PerceptionBackend,
    pub oracle: OracleConfig,
    pub ollama: OllamaConfig,
}

impl Default for SearchLoopConfig {
    fn default() -> Self {
        Self {
            goal_text: "red backpack".to_string(),
            active_constraints: Vec::new(),
            seed: 42,
            retrieval_k: 5,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            hysteresis_k: DEFAULT_HYSTERESIS_K,
            backend: HypothesisBackend::Mock,
            stop_on_done: false,
            verifier_odds: VerifierOdds::default(),
            perception_backend: PerceptionBackend::NodeOracle,
            oracle: OracleConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decision record
// ─────────────────────────────────────────────────────────────────────────────

/// Diagnostics attached to every [`StepRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMeta {
    pub vlm_latency_ms: f64,
    pub verify_latency_ms: f64,
    pub perception_latency_ms: f64,
    pub validation_error: Option<ValidationError>,
    pub retrieval_ran: bool,
    pub retrieval_topk: Vec<Candidate>,
    pub retrieval_best_score: Option<f64>,
    pub retrieval_threshold_pass: bool,
    pub vlm_backend: String,
    /// Client diagnostics; present only on the model path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlm_client: Option<VlmMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_context_missing_nodes: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memory_context_missing_node_ids: Vec<NodeId>,
    pub used_fallback: bool,
    pub vlm_status: VlmStatus,
    /// Verifier reason code, `SKIPPED` when nothing was verified.
    pub planner_status: String,
    pub perception_backend: String,
    pub perception_visible: bool,
    pub perception_confidence: f64,
    pub perception_reason: String,
    pub visibility_streak: u32,
    pub belief_transition: Option<String>,
}

/// Everything that happened in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub step_id: u64,
    pub belief_before: BeliefState,
    pub vlm_raw: RawHypothesis,
    pub vlm_validated: Option<Hypothesis>,
    pub verifier_result: VerifierResult,
    pub belief_after: BeliefState,
    pub meta: StepMeta,
}

/// Receives one [`StepRecord`] per step. Errors abort the run.
pub trait DecisionSink: Send {
    fn record(&mut self, record: &StepRecord) -> Result<(), SeekerError>;
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<StepRecord>,
}

impl DecisionSink for MemorySink {
    fn record(&mut self, record: &StepRecord) -> Result<(), SeekerError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// How a [`SearchLoop::run`] ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub steps_run: u64,
    pub final_status: BeliefStatus,
    pub cancelled: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// SearchLoop
// ─────────────────────────────────────────────────────────────────────────────

enum Source {
    Mock,
    Model(VlmClient),
    Fallback,
}

pub struct SearchLoop {
    config: SearchLoopConfig,
    run_id: Uuid,
    store: Box<dyn MemoryStore>,
    embedder: DeterministicEmbedder,
    controller: BeliefController,
    gate: HypothesisGate,
    perception: PerceptionGate,
    rng: RunRng,
    source: Source,
    belief: BeliefState,
    next_step: u64,
}

fn memory_failure(e: MemoryError) -> SeekerError {
    SeekerError::Memory(e.to_string())
}

impl SearchLoop {
    /// Build a loop over `store` with a fresh initial belief.
    ///
    /// # Errors
    ///
    /// [`SeekerError::Config`] when the Ollama client cannot be built, and
    /// [`SeekerError::InvariantViolation`] when the initial belief is invalid.
    pub fn new(config: SearchLoopConfig, store: Box<dyn MemoryStore>) -> Result<Self, SeekerError> {
        let source = match config.backend {
            HypothesisBackend::Mock => Source::Mock,
            HypothesisBackend::Fallback => Source::Fallback,
            HypothesisBackend::Ollama => {
                let transport = OllamaTransport::new(&config.ollama)
                    .map_err(|e| SeekerError::Config(format!("ollama client: {e}")))?;
                Source::Model(VlmClient::new(Box::new(transport), config.ollama.max_retries))
            }
        };

        let mut belief = BeliefState::initial(config.goal_text.clone());
        belief.active_constraints = config.active_constraints.clone();
        belief.check_invariants()?;

        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            backend = %config.backend,
            perception = %config.perception_backend,
            seed = config.seed,
            goal = %config.goal_text,
            "search loop initialised"
        );

        Ok(Self {
            controller: BeliefController::new(config.memory_threshold, config.hysteresis_k),
            gate: HypothesisGate::with_odds(config.verifier_odds),
            perception: PerceptionGate::new(config.perception_backend, config.oracle.clone()),
            rng: RunRng::from_seed(config.seed),
            embedder: DeterministicEmbedder::default(),
            config,
            run_id,
            store,
            source,
            belief,
            next_step: 0,
        })
    }

    /// Route the model path through `transport` instead of the configured
    /// Ollama server.
    pub fn with_transport(mut self, transport: Box<dyn VlmTransport>) -> Self {
        self.source = Source::Model(VlmClient::new(transport, self.config.ollama.max_retries));
        self
    }

    pub fn belief(&self) -> &BeliefState {
        &self.belief
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &SearchLoopConfig {
        &self.config
    }

    /// Index of the next step to run.
    pub fn next_step(&self) -> u64 {
        self.next_step
    }

    /// Run one full step and return its record.
    pub async fn step(&mut self) -> Result<StepRecord, SeekerError> {
        let step_id = self.next_step;
        let before = self.belief.clone();

        // ── Retrieve ────────────────────────────────────────────────────────
        let retrieval_ran = !tokenize(&before.goal_text).is_empty();
        let candidates = if retrieval_ran {
            retrieve_candidates(
                &before.goal_text,
                self.store.as_ref(),
                &self.embedder,
                self.config.retrieval_k,
            )
            .map_err(memory_failure)?
        } else {
            Vec::new()
        };
        let best = candidates.first().map(|c| c.score);
        let belief = self.controller.fold_retrieval(&before, candidates.clone());

        // ── Acquire ─────────────────────────────────────────────────────────
        let mut vlm_client = None;
        let mut missing_nodes = None;
        let mut missing_ids = Vec::new();
        let mut used_fallback = false;
        let vlm_backend;
        let raw = match &self.source {
            Source::Mock => {
                vlm_backend = "mock".to_string();
                mock_hypothesis(&mut self.rng)
            }
            Source::Fallback => {
                vlm_backend = "fallback".to_string();
                used_fallback = true;
                fallback_hypothesis(&belief, &candidates).into()
            }
            Source::Model(client) => {
                vlm_backend = client.backend().to_string();
                let (memory_context, missing) =
                    build_memory_context(&candidates, self.store.as_ref()).map_err(memory_failure)?;
                missing_nodes = Some(!missing.is_empty());
                missing_ids = missing;
                let ctx = PromptContext {
                    goal_text: belief.goal_text.clone(),
                    active_constraints: belief.active_constraints.clone(),
                    belief_status: belief.target_status,
                    memory_context,
                };
                let proposal = client.propose(&ctx).await;
                vlm_client = Some(proposal.meta);
                match proposal.object {
                    Some(object) => RawHypothesis::Structured(object),
                    None => {
                        used_fallback = true;
                        fallback_hypothesis(&belief, &candidates).into()
                    }
                }
            }
        };

        // ── Gate, decide, act ───────────────────────────────────────────────
        let outcome: GateOutcome = self.gate.admit(&raw, &mut self.rng);
        let planner_status = outcome.verifier_result.reason_code.as_str().to_string();
        let belief = self.controller.apply_decision(&belief, &outcome);
        let belief = self.controller.simulate_action(&belief);

        // ── Perceive ────────────────────────────────────────────────────────
        let report = self
            .perception
            .check(&belief.goal_text, belief.current_node_id);
        let visibility = report.result.clone();
        let update = self
            .controller
            .apply_perception(&belief, report.result, step_id);

        before.check_transition(&update.belief)?;
        if let Some(label) = &update.transition {
            info!(step = step_id, transition = %label, "belief transition");
        }

        let meta = StepMeta {
            vlm_latency_ms: vlm_client.as_ref().map_or(0.0, |m| m.vlm_latency_ms),
            verify_latency_ms: outcome.verify_latency_ms,
            perception_latency_ms: report.latency_ms,
            validation_error: outcome.validation_error.clone(),
            retrieval_ran,
            retrieval_topk: candidates,
            retrieval_best_score: best,
            retrieval_threshold_pass: best.is_some_and(|s| s >= self.config.memory_threshold),
            vlm_backend,
            vlm_client,
            memory_context_missing_nodes: missing_nodes,
            memory_context_missing_node_ids: missing_ids,
            used_fallback,
            vlm_status: outcome.status,
            planner_status,
            perception_backend: visibility.backend.clone(),
            perception_visible: visibility.is_visible,
            perception_confidence: visibility.confidence,
            perception_reason: visibility.evidence.reason.clone(),
            visibility_streak: update.belief.visibility_streak,
            belief_transition: update.transition,
        };

        info!(
            step = step_id,
            vlm = %meta.vlm_status,
            planner = %meta.planner_status,
            state = %update.belief.target_status,
            action = %update.belief.next_action,
            fallback = meta.used_fallback,
            "step complete"
        );

        self.belief = update.belief.clone();
        self.next_step += 1;

        Ok(StepRecord {
            run_id: self.run_id,
            timestamp: Utc::now(),
            step_id,
            belief_before: before,
            vlm_raw: raw,
            vlm_validated: outcome.validated,
            verifier_result: outcome.verifier_result,
            belief_after: update.belief,
            meta,
        })
    }

    /// Run up to `steps` steps, handing each record to `sink`.
    ///
    /// `cancel` is checked between steps only; a step in progress always
    /// completes.
    pub async fn run(
        &mut self,
        steps: u64,
        sink: &mut dyn DecisionSink,
        cancel: &AtomicBool,
    ) -> Result<RunSummary, SeekerError> {
        let mut steps_run = 0;
        let mut cancelled = false;
        for _ in 0..steps {
            if cancel.load(Ordering::SeqCst) {
                warn!(run_id = %self.run_id, steps_run, "run cancelled");
                cancelled = true;
                break;
            }
            let record = self.step().await?;
            sink.record(&record)?;
            steps_run += 1;
            if self.config.stop_on_done && self.belief.target_status == BeliefStatus::Done {
                info!(step = record.step_id, "target reached, stopping early");
                break;
            }
        }
        Ok(RunSummary {
            run_id: self.run_id,
            steps_run,
            final_status: self.belief.target_status,
            cancelled,
        })
    }
}
