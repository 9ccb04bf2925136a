//! Seeded stand-in for the external model.
//!
//! Each call draws from the run's [`RunRng`]:
//!
//! - 70%: one of six valid hypotheses covering every action;
//! - 20%: one of three objects that break the contract;
//! - 10%: the unparseable string `"{ this is not json"`.
//!
//! Exercising all three gate outcomes without a model server is the point.

use seeker_kernel::{RawHypothesis, RunRng};
use serde_json::{Value, json};

pub const UNPARSEABLE: &str = "{ this is not json";

fn valid_pool() -> [Value; 6] {
    [
        json!({
            "target_status": "visible",
            "action": "goto_node",
            "confidence": 0.9,
            "rationale": "Target detected at node 5",
            "navigation_goal": {"type": "node_id", "node_id": 5}
        }),
        json!({
            "target_status": "ambiguous",
            "action": "ask_clarification",
            "confidence": 0.5,
            "rationale": "Multiple red objects visible",
            "clarification_question": "Which red backpack?"
        }),
        json!({
            "target_status": "visible",
            "action": "approach",
            "confidence": 0.8,
            "rationale": "Target visible, approaching",
            "navigation_goal": {
                "type": "pose_relative",
                "distance_meters": 2.0,
                "angle_degrees": 45.0,
                "standoff_distance": 0.5
            }
        }),
        json!({
            "target_status": "not_visible",
            "action": "explore",
            "confidence": 0.6,
            "rationale": "Searching for target"
        }),
        json!({
            "target_status": "not_visible",
            "action": "rotate",
            "confidence": 0.7,
            "rationale": "Scanning environment"
        }),
        json!({
            "target_status": "visible",
            "action": "stop",
            "confidence": 1.0,
            "rationale": "Target reached"
        }),
    ]
}

fn invalid_pool() -> [Value; 3] {
    [
        json!({"target_status": "visible", "action": "explore"}),
        json!({
            "target_status": "visible",
            "action": "goto_node",
            "confidence": 0.9,
            "rationale": "Target at node"
        }),
        json!({
            "target_status": "visible",
            "action": "approach",
            "confidence": 0.8,
            "rationale": "Approaching"
        }),
    ]
}

/// Draw one raw hypothesis.
pub fn mock_hypothesis(rng: &mut RunRng) -> RawHypothesis {
    let roll = rng.roll();
    if roll < 0.7 {
        let pool = valid_pool();
        RawHypothesis::Structured(pool[rng.pick(pool.len())].clone())
    } else if roll < 0.9 {
        let pool = invalid_pool();
        RawHypothesis::Structured(pool[rng.pick(pool.len())].clone())
    } else {
        RawHypothesis::Text(UNPARSEABLE.to_string())
    }
}
