//! Deterministic safety-net hypotheses.
//!
//! Used whenever the model path is disabled or produced nothing usable. A
//! pure function of the belief status and the current candidates:
//!
//! | Condition | Action | `target_status` | Confidence |
//! |---|---|---|---|
//! | belief `done` | `stop` | visible | 0.9 |
//! | belief `visible` | `approach` (1 m ahead, 0.5 m standoff) | visible | 0.7 |
//! | candidates present | `goto_node` top candidate | not_visible | 0.5 |
//! | otherwise | `explore` | not_visible | 0.3 |

use seeker_types::{
    Action, BeliefState, BeliefStatus, Candidate, Hypothesis, NavigationGoal, TargetStatus,
};

pub fn fallback_hypothesis(belief: &BeliefState, candidates: &[Candidate]) -> Hypothesis {
    let make = |target_status, action, confidence, rationale: &str, goal| Hypothesis {
        target_status,
        action,
        confidence,
        rationale: rationale.to_string(),
        navigation_goal: goal,
        clarification_question: None,
    };

    match belief.target_status {
        BeliefStatus::Done => make(TargetStatus::Visible, Action::Stop, 0.9, "Goal completed", None),
        BeliefStatus::Visible => make(
            TargetStatus::Visible,
            Action::Approach,
            0.7,
            "Approaching visible target",
            Some(NavigationGoal::PoseRelative {
                distance_meters: 1.0,
                angle_degrees: 0.0,
                standoff_distance: 0.5,
            }),
        ),
        _ => match candidates.first() {
            Some(top) => make(
                TargetStatus::NotVisible,
                Action::GotoNode,
                0.5,
                "Navigating to candidate memory node",
                Some(NavigationGoal::NodeId {
                    node_id: top.node_id,
                }),
            ),
            None => make(
                TargetStatus::NotVisible,
                Action::Explore,
                0.3,
                "Exploring for target",
                None,
            ),
        },
    }
}
