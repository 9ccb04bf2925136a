//! Oracle tables standing in for ground-truth perception.
//!
//! Two tables are supported:
//!
//! - **node map** – `node_id → confidence`: the target is visible from every
//!   listed node with the given confidence.
//! - **relpose map** – `goal_key → node_id → RelPoseEntry`: per-goal relative
//!   pose of the target as seen from a node. Goal keys are stored normalized
//!   (see [`normalize_goal_text`]).
//!
//! The gate takes an [`OracleConfig`] by value, so it always works on its own
//! copy and can neither observe nor cause mutation of the caller's tables.
//!
//! ```rust
//! use seeker_perception::oracle::{OracleConfig, RelPoseEntry};
//!
//! let oracle = OracleConfig::new()
//!     .with_node(5, 0.9)
//!     .with_relpose("  Red Backpack", 5, RelPoseEntry::new(2.0, 0.3));
//! assert_eq!(oracle.node_confidence(5), Some(0.9));
//! assert!(oracle.relpose("red backpack", 5).is_some());
//! ```

use std::collections::BTreeMap;

use seeker_types::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::goal::normalize_goal_text;

/// Relative pose of the target as seen from one node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RelPoseEntry {
    pub distance_m: Option<f64>,
    pub bearing_rad: Option<f64>,
    /// Parsed defensively: numbers and numeric strings are accepted, anything
    /// else collapses to 0. When absent the node map value (or 1.0) is used.
    #[serde(default)]
    pub confidence: Option<Value>,
}

impl RelPoseEntry {
    pub fn new(distance_m: f64, bearing_rad: f64) -> Self {
        Self {
            distance_m: Some(distance_m),
            bearing_rad: Some(bearing_rad),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: impl Into<Value>) -> Self {
        self.confidence = Some(confidence.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub node_map: BTreeMap<NodeId, f64>,
    #[serde(default)]
    pub relpose_map: BTreeMap<String, BTreeMap<NodeId, RelPoseEntry>>,
}

impl OracleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node_id: NodeId, confidence: f64) -> Self {
        self.node_map.insert(node_id, confidence);
        self
    }

    /// Register a relative-pose entry under the normalized form of `goal_text`.
    pub fn with_relpose(mut self, goal_text: &str, node_id: NodeId, entry: RelPoseEntry) -> Self {
        self.relpose_map
            .entry(normalize_goal_text(goal_text))
            .or_default()
            .insert(node_id, entry);
        self
    }

    pub fn node_confidence(&self, node_id: NodeId) -> Option<f64> {
        self.node_map.get(&node_id).copied()
    }

    pub fn has_goal(&self, goal_key: &str) -> bool {
        self.relpose_map.contains_key(goal_key)
    }

    pub fn relpose(&self, goal_key: &str, node_id: NodeId) -> Option<&RelPoseEntry> {
        self.relpose_map.get(goal_key)?.get(&node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relpose_goal_keys_are_normalized() {
        let oracle = OracleConfig::new().with_relpose("RED   backpack ", 3, RelPoseEntry::new(1.0, 0.0));
        assert!(oracle.has_goal("red backpack"));
        assert!(!oracle.has_goal("RED   backpack "));
        assert_eq!(oracle.relpose("red backpack", 3).and_then(|e| e.distance_m), Some(1.0));
        assert!(oracle.relpose("red backpack", 4).is_none());
    }

    #[test]
    fn copies_are_independent() {
        let source = OracleConfig::new().with_node(5, 0.9);
        let mut copy = source.clone();
        copy.node_map.insert(99, 0.5);
        assert_eq!(source.node_confidence(99), None);
        assert_eq!(source.node_map.len(), 1);
    }

    #[test]
    fn deserializes_from_json() {
        let oracle: OracleConfig = serde_json::from_str(
            r#"{"node_map": {"5": 0.9}, "relpose_map": {"red backpack": {"5": {"distance_m": 2.0, "bearing_rad": 0.1, "confidence": "high"}}}}"#,
        )
        .unwrap();
        assert_eq!(oracle.node_confidence(5), Some(0.9));
        assert_eq!(
            oracle.relpose("red backpack", 5).and_then(|e| e.confidence.clone()),
            Some(Value::from("high"))
        );
    }
}
