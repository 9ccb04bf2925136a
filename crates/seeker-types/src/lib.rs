//! `seeker-types` – shared vocabulary of the Seeker decision engine.
//!
//! Every other crate speaks in these types: memory nodes and retrieval
//! candidates, the untrusted [`Hypothesis`] proposed by the vision-language
//! model, the verifier and perception results, and the single mutable
//! [`BeliefState`] that the runtime commits once per step.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a node in the memory store. Assigned append-only, starting at 0.
pub type NodeId = u64;

/// Planar pose `(x, y, yaw)` attached to a memory node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading in radians.
    pub yaw: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }
}

/// A remembered location with its semantic description.
///
/// Nodes are never mutated after the store creates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub node_id: NodeId,
    pub pose: Pose,
    /// Optional precomputed embedding; when absent the retrieval scorer embeds
    /// `summary + " " + tags`.
    pub embedding: Option<Vec<f32>>,
    pub tags: Vec<String>,
    pub summary: String,
}

impl MemoryNode {
    /// Text used for embedding and keyword matching.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.summary, self.tags.join(" "))
    }
}

/// A scored retrieval result. Ephemeral: produced per retrieval call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub node_id: NodeId,
    /// Hybrid similarity in `[0.0, 1.0]`.
    pub score: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Hypothesis
// ─────────────────────────────────────────────────────────────────────────────

/// What the model claims to see. Never trusted for belief transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Visible,
    NotVisible,
    Ambiguous,
}

/// Next action proposed by a hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Approach,
    Explore,
    Rotate,
    GotoNode,
    AskClarification,
    Stop,
}

impl Action {
    /// All actions in wire order.
    pub const ALL: [Action; 6] = [
        Action::Approach,
        Action::Explore,
        Action::Rotate,
        Action::GotoNode,
        Action::AskClarification,
        Action::Stop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Approach => "approach",
            Action::Explore => "explore",
            Action::Rotate => "rotate",
            Action::GotoNode => "goto_node",
            Action::AskClarification => "ask_clarification",
            Action::Stop => "stop",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the agent should move to, discriminated by `type` on the wire.
///
/// `NodeId` is required for [`Action::GotoNode`], `PoseRelative` for
/// [`Action::Approach`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationGoal {
    NodeId {
        node_id: NodeId,
    },
    PoseRelative {
        distance_meters: f64,
        angle_degrees: f64,
        standoff_distance: f64,
    },
}

/// A structured next-step proposal.
///
/// Only obtainable from untrusted input through the hypothesis validator, or
/// from the deterministic fallback generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Hypothesis {
    pub target_status: TargetStatus,
    pub action: Action,
    /// Model confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Free-text justification, at most 240 characters.
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_goal: Option<NavigationGoal>,
    /// Required for [`Action::AskClarification`], at most 160 characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
}

impl Hypothesis {
    /// Node targeted by a `node_id` navigation goal, if any.
    pub fn target_node_id(&self) -> Option<NodeId> {
        match self.navigation_goal {
            Some(NavigationGoal::NodeId { node_id }) => Some(node_id),
            _ => None,
        }
    }
}

/// JSON Schema of [`Hypothesis`], injected into model requests as the
/// structured-output format.
pub fn hypothesis_json_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(Hypothesis)).unwrap_or(serde_json::Value::Null)
}

// ─────────────────────────────────────────────────────────────────────────────
// Verifier / perception results
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome code of the geometric verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Ok,
    CollisionDetected,
    ConstraintViolation,
    Skipped,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::Ok => "OK",
            ReasonCode::CollisionDetected => "COLLISION_DETECTED",
            ReasonCode::ConstraintViolation => "CONSTRAINT_VIOLATION",
            ReasonCode::Skipped => "SKIPPED",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierResult {
    pub ok: bool,
    pub reason_code: ReasonCode,
    pub details: BTreeMap<String, serde_json::Value>,
}

impl VerifierResult {
    /// Result used when no validated hypothesis reached the verifier.
    pub fn skipped() -> Self {
        Self {
            ok: false,
            reason_code: ReasonCode::Skipped,
            details: BTreeMap::new(),
        }
    }
}

/// Structured evidence attached to every perception answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// e.g. `"oracle_hit"`, `"relpose_miss"`, `"exception"`.
    pub reason: String,
    pub node_id: Option<NodeId>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The perception gate's answer to "is the target visible here?".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityResult {
    pub is_visible: bool,
    /// Clamped to `[0.0, 1.0]`.
    pub confidence: f64,
    pub backend: String,
    pub distance_m: Option<f64>,
    pub bearing_rad: Option<f64>,
    /// Normalized goal text used for relative-pose lookups.
    pub target_goal_key: Option<String>,
    pub evidence: Evidence,
}

// ─────────────────────────────────────────────────────────────────────────────
// Belief state
// ─────────────────────────────────────────────────────────────────────────────

/// Progress of the search, ordered as a monotone lattice:
/// `{searching, ambiguous, not_visible} → likely_in_memory → visible → done`,
/// plus the separate terminal `unreachable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeliefStatus {
    Searching,
    LikelyInMemory,
    Ambiguous,
    NotVisible,
    Visible,
    Done,
    Unreachable,
}

impl BeliefStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BeliefStatus::Searching => "searching",
            BeliefStatus::LikelyInMemory => "likely_in_memory",
            BeliefStatus::Ambiguous => "ambiguous",
            BeliefStatus::NotVisible => "not_visible",
            BeliefStatus::Visible => "visible",
            BeliefStatus::Done => "done",
            BeliefStatus::Unreachable => "unreachable",
        }
    }

    /// Position on the main lattice. `None` for the `unreachable` terminal.
    pub fn rank(self) -> Option<u8> {
        match self {
            BeliefStatus::Searching | BeliefStatus::Ambiguous | BeliefStatus::NotVisible => Some(0),
            BeliefStatus::LikelyInMemory => Some(1),
            BeliefStatus::Visible => Some(2),
            BeliefStatus::Done => Some(3),
            BeliefStatus::Unreachable => None,
        }
    }

    /// `true` if moving from `self` to `next` never goes backward.
    pub fn can_transition_to(self, next: BeliefStatus) -> bool {
        match (self.rank(), next.rank()) {
            (None, None) => true,
            (None, Some(_)) => false,
            (Some(_), None) => true,
            (Some(a), Some(b)) => b >= a,
        }
    }
}

impl fmt::Display for BeliefStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The agent's single record of progress toward finding the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeliefState {
    pub target_status: BeliefStatus,
    pub goal_text: String,
    pub active_constraints: Vec<String>,
    pub candidate_nodes: Vec<Candidate>,
    pub next_action: Action,
    pub current_node_id: Option<NodeId>,
    pub last_vlm_hypothesis: Option<Hypothesis>,
    pub rejection_reason: Option<String>,
    pub last_visibility: Option<VisibilityResult>,
    pub visibility_streak: u32,
    pub last_seen_node_id: Option<NodeId>,
    pub visible_since_step: Option<u64>,
}

impl BeliefState {
    /// Fixed startup belief for `goal_text`.
    pub fn initial(goal_text: impl Into<String>) -> Self {
        Self {
            target_status: BeliefStatus::Searching,
            goal_text: goal_text.into(),
            active_constraints: Vec::new(),
            candidate_nodes: Vec::new(),
            next_action: Action::Explore,
            current_node_id: None,
            last_vlm_hypothesis: None,
            rejection_reason: None,
            last_visibility: None,
            visibility_streak: 0,
            last_seen_node_id: None,
            visible_since_step: None,
        }
    }

    /// Check the belief's own contract.
    ///
    /// # Errors
    ///
    /// Returns [`SeekerError::InvariantViolation`] describing the first broken
    /// rule. A violation indicates a logic defect and must abort the run.
    pub fn check_invariants(&self) -> Result<(), SeekerError> {
        for c in &self.candidate_nodes {
            if !c.score.is_finite() || !(0.0..=1.0).contains(&c.score) {
                return Err(SeekerError::InvariantViolation(format!(
                    "candidate {} has score {} outside [0, 1]",
                    c.node_id, c.score
                )));
            }
        }
        for pair in self.candidate_nodes.windows(2) {
            let ordered = pair[0].score > pair[1].score
                || (pair[0].score == pair[1].score && pair[0].node_id < pair[1].node_id);
            if !ordered {
                return Err(SeekerError::InvariantViolation(format!(
                    "candidates {} and {} are out of order",
                    pair[0].node_id, pair[1].node_id
                )));
            }
        }
        if matches!(self.target_status, BeliefStatus::Visible | BeliefStatus::Done)
            && (self.last_seen_node_id.is_none() || self.visible_since_step.is_none())
        {
            return Err(SeekerError::InvariantViolation(format!(
                "status {} without last_seen_node_id / visible_since_step",
                self.target_status
            )));
        }
        if let Some(vr) = &self.last_visibility {
            if !(0.0..=1.0).contains(&vr.confidence) {
                return Err(SeekerError::InvariantViolation(format!(
                    "visibility confidence {} outside [0, 1]",
                    vr.confidence
                )));
            }
            if !vr.is_visible && self.visibility_streak != 0 {
                return Err(SeekerError::InvariantViolation(
                    "non-zero visibility streak after a negative perception".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Check that `next` does not move `target_status` backward relative to
    /// `self`, then check `next`'s own contract.
    pub fn check_transition(&self, next: &BeliefState) -> Result<(), SeekerError> {
        if !self.target_status.can_transition_to(next.target_status) {
            return Err(SeekerError::InvariantViolation(format!(
                "target_status moved backward: {} -> {}",
                self.target_status, next.target_status
            )));
        }
        next.check_invariants()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Fatal run-level errors. Untrusted-input and service failures are recovered
/// inside a step and never surface here.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum SeekerError {
    #[error("Belief invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Memory store error: {0}")]
    Memory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_visibility(is_visible: bool, confidence: f64) -> VisibilityResult {
        VisibilityResult {
            is_visible,
            confidence,
            backend: "node_oracle".to_string(),
            distance_m: None,
            bearing_rad: None,
            target_goal_key: None,
            evidence: Evidence {
                reason: "oracle_hit".to_string(),
                node_id: Some(5),
                extra: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn wire_names_match_the_hypothesis_contract() {
        let h = Hypothesis {
            target_status: TargetStatus::NotVisible,
            action: Action::GotoNode,
            confidence: 0.5,
            rationale: "go".into(),
            navigation_goal: Some(NavigationGoal::NodeId { node_id: 3 }),
            clarification_question: None,
        };
        let v = serde_json::to_value(&h).unwrap();
        assert_eq!(v["target_status"], "not_visible");
        assert_eq!(v["action"], "goto_node");
        assert_eq!(v["navigation_goal"]["type"], "node_id");
        assert_eq!(v["navigation_goal"]["node_id"], 3);
        assert!(v.get("clarification_question").is_none());
    }

    #[test]
    fn pose_relative_goal_is_tagged() {
        let json = r#"{"type":"pose_relative","distance_meters":2.0,"angle_degrees":45.0,"standoff_distance":0.5}"#;
        let goal: NavigationGoal = serde_json::from_str(json).unwrap();
        assert!(matches!(goal, NavigationGoal::PoseRelative { standoff_distance, .. } if standoff_distance == 0.5));
    }

    #[test]
    fn reason_codes_serialize_screaming() {
        let json = serde_json::to_string(&ReasonCode::CollisionDetected).unwrap();
        assert_eq!(json, "\"COLLISION_DETECTED\"");
        assert_eq!(ReasonCode::Skipped.to_string(), "SKIPPED");
    }

    #[test]
    fn target_node_id_only_for_node_goals() {
        let mut h = Hypothesis {
            target_status: TargetStatus::Visible,
            action: Action::Approach,
            confidence: 0.7,
            rationale: String::new(),
            navigation_goal: Some(NavigationGoal::PoseRelative {
                distance_meters: 1.0,
                angle_degrees: 0.0,
                standoff_distance: 0.5,
            }),
            clarification_question: None,
        };
        assert_eq!(h.target_node_id(), None);
        h.navigation_goal = Some(NavigationGoal::NodeId { node_id: 9 });
        assert_eq!(h.target_node_id(), Some(9));
    }

    #[test]
    fn status_lattice_is_monotone() {
        use BeliefStatus::*;
        assert!(Searching.can_transition_to(LikelyInMemory));
        assert!(Ambiguous.can_transition_to(LikelyInMemory));
        assert!(LikelyInMemory.can_transition_to(Visible));
        assert!(Visible.can_transition_to(Done));
        assert!(Searching.can_transition_to(Unreachable));
        assert!(!LikelyInMemory.can_transition_to(Searching));
        assert!(!Visible.can_transition_to(LikelyInMemory));
        assert!(!Done.can_transition_to(Visible));
        assert!(!Unreachable.can_transition_to(Searching));
    }

    #[test]
    fn initial_belief_satisfies_contract() {
        let b = BeliefState::initial("red backpack");
        assert_eq!(b.target_status, BeliefStatus::Searching);
        assert_eq!(b.next_action, Action::Explore);
        assert_eq!(b.visibility_streak, 0);
        assert!(b.check_invariants().is_ok());
    }

    #[test]
    fn unsorted_candidates_violate_contract() {
        let mut b = BeliefState::initial("red backpack");
        b.candidate_nodes = vec![
            Candidate { node_id: 1, score: 0.4 },
            Candidate { node_id: 0, score: 0.6 },
        ];
        assert!(matches!(
            b.check_invariants(),
            Err(SeekerError::InvariantViolation(_))
        ));
    }

    #[test]
    fn visible_without_sighting_violates_contract() {
        let mut b = BeliefState::initial("red backpack");
        b.target_status = BeliefStatus::Visible;
        assert!(b.check_invariants().is_err());
        b.last_seen_node_id = Some(5);
        b.visible_since_step = Some(1);
        assert!(b.check_invariants().is_ok());
    }

    #[test]
    fn streak_must_reset_on_negative_perception() {
        let mut b = BeliefState::initial("red backpack");
        b.last_visibility = Some(sample_visibility(false, 0.0));
        b.visibility_streak = 1;
        assert!(b.check_invariants().is_err());
    }

    #[test]
    fn backward_transition_is_rejected() {
        let mut before = BeliefState::initial("red backpack");
        before.target_status = BeliefStatus::LikelyInMemory;
        let after = BeliefState::initial("red backpack");
        let err = before.check_transition(&after).unwrap_err();
        assert!(err.to_string().contains("likely_in_memory -> searching"));
    }

    #[test]
    fn hypothesis_schema_lists_actions() {
        let schema = hypothesis_json_schema().to_string();
        assert!(schema.contains("goto_node"));
        assert!(schema.contains("ask_clarification"));
        assert!(schema.contains("pose_relative"));
    }
}
