//! [`BeliefController`] – pure belief transitions.
//!
//! Every transition takes the previous belief by reference and returns a new
//! one, so the monotonicity contract can be tested without any I/O. A step
//! applies them in this order:
//!
//! 1. [`fold_retrieval`][BeliefController::fold_retrieval] – overwrite the
//!    candidates; `searching → likely_in_memory` when the top score reaches
//!    the memory threshold. Nothing else moves.
//! 2. [`apply_decision`][BeliefController::apply_decision] – record the
//!    validated hypothesis and rejection reason; the hypothesis' action is
//!    adopted only when it verified, otherwise `explore`.
//! 3. [`simulate_action`][BeliefController::simulate_action] – `goto_node`
//!    moves the agent to the target node; other actions stay put.
//! 4. [`apply_perception`][BeliefController::apply_perception] – the only
//!    path to `visible` and `done`, gated by hysteresis and the completion
//!    guard.
//!
//! The `visible → done` guard compares `current_node_id` with
//! `last_seen_node_id` as a stand-in for physical proximity.

use seeker_kernel::GateOutcome;
use seeker_types::{Action, BeliefState, BeliefStatus, Candidate, NodeId, VisibilityResult};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default top-score threshold for `searching → likely_in_memory`.
pub const DEFAULT_MEMORY_THRESHOLD: f64 = 0.3;
/// Default number of consecutive positive perceptions required for `visible`.
pub const DEFAULT_HYSTERESIS_K: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeliefController {
    pub memory_threshold: f64,
    pub hysteresis_k: u32,
}

impl Default for BeliefController {
    fn default() -> Self {
        Self {
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            hysteresis_k: DEFAULT_HYSTERESIS_K,
        }
    }
}

/// A belief after perception plus the status transition it caused, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptionUpdate {
    pub belief: BeliefState,
    /// `"<old>->visible"` or `"visible->done"`.
    pub transition: Option<String>,
}

impl BeliefController {
    pub fn new(memory_threshold: f64, hysteresis_k: u32) -> Self {
        Self {
            memory_threshold,
            hysteresis_k,
        }
    }

    pub fn fold_retrieval(&self, belief: &BeliefState, candidates: Vec<Candidate>) -> BeliefState {
        let mut next = belief.clone();
        let promote = belief.target_status == BeliefStatus::Searching
            && candidates
                .first()
                .is_some_and(|top| top.score >= self.memory_threshold);
        if promote {
            next.target_status = BeliefStatus::LikelyInMemory;
        }
        next.candidate_nodes = candidates;
        next
    }

    pub fn apply_decision(&self, belief: &BeliefState, outcome: &GateOutcome) -> BeliefState {
        let mut next = belief.clone();
        next.last_vlm_hypothesis = outcome.validated.clone();
        next.rejection_reason = outcome.rejection_reason();
        next.next_action = match &outcome.validated {
            Some(h) if outcome.verifier_result.ok => h.action,
            _ => Action::Explore,
        };
        next
    }

    pub fn simulate_action(&self, belief: &BeliefState) -> BeliefState {
        let mut next = belief.clone();
        if next.next_action == Action::GotoNode {
            if let Some(target) = next
                .last_vlm_hypothesis
                .as_ref()
                .and_then(|h| h.target_node_id())
            {
                next.current_node_id = Some(target);
            }
        }
        next
    }

    pub fn apply_perception(
        &self,
        belief: &BeliefState,
        visibility: VisibilityResult,
        step_id: u64,
    ) -> PerceptionUpdate {
        let mut next = belief.clone();
        let visible = visibility.is_visible;
        next.last_visibility = Some(visibility);
        next.visibility_streak = if visible {
            next.visibility_streak.saturating_add(1)
        } else {
            0
        };

        let mut transition = None;
        let old = next.target_status;
        let promotable = !matches!(
            old,
            BeliefStatus::Visible | BeliefStatus::Done | BeliefStatus::Unreachable
        );
        if promotable && next.visibility_streak >= self.hysteresis_k {
            if let Some(node) = next.current_node_id {
                next.target_status = BeliefStatus::Visible;
                next.last_seen_node_id = Some(node);
                next.visible_since_step = Some(step_id);
                transition = Some(format!("{old}->visible"));
                info!(node_id = node, step = step_id, "target confirmed visible");
            }
        }

        if next.target_status == BeliefStatus::Visible
            && next.next_action == Action::Approach
            && visible
            && close_enough(&next, step_id)
        {
            next.target_status = BeliefStatus::Done;
            transition = Some("visible->done".to_string());
            info!(node_id = ?next.current_node_id, step = step_id, "target reached");
        }

        PerceptionUpdate {
            belief: next,
            transition,
        }
    }
}

/// Completion guard: a later step than the visibility promotion, at the
/// node the target was confirmed from.
fn close_enough(belief: &BeliefState, step_id: u64) -> bool {
    let same_node = |current: NodeId| belief.last_seen_node_id == Some(current);
    belief.visible_since_step.is_some_and(|since| step_id > since)
        && belief.current_node_id.is_some_and(same_node)
}
