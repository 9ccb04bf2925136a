//! [`PerceptionGate`] – the only component allowed to confirm visibility.
//!
//! Two interchangeable backends:
//!
//! | Backend | Lookup | Hit |
//! |---------|--------|-----|
//! | [`NodeOracle`][PerceptionBackend::NodeOracle] | `node_map[current]` | visible with the mapped confidence |
//! | [`NodeOracleRelpose`][PerceptionBackend::NodeOracleRelpose] | `relpose_map[goal_key][current]` | visible iff clamped confidence `> 0` |
//!
//! Every call returns a full [`VisibilityResult`] (backend identity and
//! structured [`Evidence`]) plus the lookup latency. Internal lookup failures
//! are never propagated: they become a negative answer with
//! `reason = "exception"` and the error attached to the evidence.
//!
//! # Example
//!
//! ```
//! use seeker_perception::{OracleConfig, PerceptionBackend, PerceptionGate};
//!
//! let gate = PerceptionGate::new(PerceptionBackend::NodeOracle, OracleConfig::new().with_node(5, 0.9));
//!
//! let hit = gate.check("red backpack", Some(5)).result;
//! assert!(hit.is_visible);
//! assert_eq!(hit.evidence.reason, "oracle_hit");
//!
//! let miss = gate.check("red backpack", Some(6)).result;
//! assert!(!miss.is_visible);
//! assert_eq!(miss.confidence, 0.0);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use seeker_types::{Evidence, NodeId, VisibilityResult};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use crate::goal::normalize_goal_text;
use crate::oracle::{OracleConfig, RelPoseEntry};

/// Confidence used when a relpose entry has none and the node map is silent.
pub const DEFAULT_RELPOSE_CONFIDENCE: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptionBackend {
    #[default]
    NodeOracle,
    NodeOracleRelpose,
}

impl PerceptionBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            PerceptionBackend::NodeOracle => "node_oracle",
            PerceptionBackend::NodeOracleRelpose => "node_oracle_relpose",
        }
    }
}

impl fmt::Display for PerceptionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Internal lookup failures. Never escape [`PerceptionGate::check`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PerceptionError {
    #[error("oracle confidence {value} for node {node_id} is outside [0, 1]")]
    InvalidOracleConfidence { node_id: NodeId, value: f64 },

    #[error("relpose entry for node {node_id} under '{goal_key}' has non-finite {field}")]
    InvalidRelPose {
        goal_key: String,
        node_id: NodeId,
        field: &'static str,
    },
}

impl PerceptionError {
    /// Stable name reported as `exception_type` in the evidence.
    pub fn kind(&self) -> &'static str {
        match self {
            PerceptionError::InvalidOracleConfidence { .. } => "InvalidOracleConfidence",
            PerceptionError::InvalidRelPose { .. } => "InvalidRelPose",
        }
    }
}

/// A perception answer plus how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptionReport {
    pub result: VisibilityResult,
    pub latency_ms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct PerceptionGate {
    backend: PerceptionBackend,
    oracle: OracleConfig,
}

impl PerceptionGate {
    /// Construct a gate that owns its own copy of the oracle tables.
    pub fn new(backend: PerceptionBackend, oracle: OracleConfig) -> Self {
        Self { backend, oracle }
    }

    pub fn backend(&self) -> PerceptionBackend {
        self.backend
    }

    /// Is the target described by `goal_text` visible from `current_node_id`?
    pub fn check(&self, goal_text: &str, current_node_id: Option<NodeId>) -> PerceptionReport {
        let started = Instant::now();
        let mut result = VisibilityResult {
            is_visible: false,
            confidence: 0.0,
            backend: self.backend.as_str().to_string(),
            distance_m: None,
            bearing_rad: None,
            target_goal_key: None,
            evidence: Evidence {
                reason: "not_checked".to_string(),
                node_id: current_node_id,
                extra: BTreeMap::new(),
            },
        };

        let outcome = match self.backend {
            PerceptionBackend::NodeOracle => self.node_oracle(current_node_id, &mut result),
            PerceptionBackend::NodeOracleRelpose => {
                self.relpose_oracle(goal_text, current_node_id, &mut result)
            }
        };
        if let Err(e) = outcome {
            warn!(error = %e, node_id = ?current_node_id, "perception lookup failed");
            result.is_visible = false;
            result.confidence = 0.0;
            result.distance_m = None;
            result.bearing_rad = None;
            result.evidence.reason = "exception".to_string();
            result.evidence.extra.insert("error".into(), json!(e.to_string()));
            result.evidence.extra.insert("exception_type".into(), json!(e.kind()));
        }

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(
            backend = %self.backend,
            node_id = ?current_node_id,
            visible = result.is_visible,
            confidence = result.confidence,
            reason = %result.evidence.reason,
            "perception check"
        );
        PerceptionReport { result, latency_ms }
    }

    fn node_oracle(
        &self,
        current_node_id: Option<NodeId>,
        result: &mut VisibilityResult,
    ) -> Result<(), PerceptionError> {
        let Some(node_id) = current_node_id else {
            miss(result, "oracle_miss", "current_node_id is None".to_string());
            return Ok(());
        };
        match self.oracle.node_confidence(node_id) {
            Some(value) => {
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(PerceptionError::InvalidOracleConfidence { node_id, value });
                }
                result.is_visible = true;
                result.confidence = value;
                result.evidence.reason = "oracle_hit".to_string();
                result.evidence.extra.insert("oracle_confidence".into(), json!(value));
            }
            None => miss(result, "oracle_miss", format!("node {node_id} not in oracle map")),
        }
        Ok(())
    }

    fn relpose_oracle(
        &self,
        goal_text: &str,
        current_node_id: Option<NodeId>,
        result: &mut VisibilityResult,
    ) -> Result<(), PerceptionError> {
        let goal_key = normalize_goal_text(goal_text);
        result.target_goal_key = Some(goal_key.clone());

        let Some(node_id) = current_node_id else {
            miss(result, "relpose_miss", "current_node_id is None".to_string());
            return Ok(());
        };
        if !self.oracle.has_goal(&goal_key) {
            miss(result, "relpose_miss", format!("goal_key '{goal_key}' not in relpose map"));
            return Ok(());
        }
        let Some(entry) = self.oracle.relpose(&goal_key, node_id) else {
            miss(
                result,
                "relpose_miss",
                format!("node {node_id} not mapped for goal '{goal_key}'"),
            );
            return Ok(());
        };

        for (field, value) in [("distance_m", entry.distance_m), ("bearing_rad", entry.bearing_rad)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(PerceptionError::InvalidRelPose {
                    goal_key,
                    node_id,
                    field,
                });
            }
        }

        let confidence = self.resolve_confidence(entry, node_id);
        result.is_visible = confidence > 0.0;
        result.confidence = confidence;
        result.distance_m = entry.distance_m;
        result.bearing_rad = entry.bearing_rad;
        result.evidence.reason = "relpose_hit".to_string();
        let extra = &mut result.evidence.extra;
        extra.insert("goal_key".into(), json!(goal_key));
        extra.insert("distance_m".into(), json!(entry.distance_m));
        extra.insert("bearing_rad".into(), json!(entry.bearing_rad));
        extra.insert("confidence".into(), json!(confidence));
        Ok(())
    }

    fn resolve_confidence(&self, entry: &RelPoseEntry, node_id: NodeId) -> f64 {
        match &entry.confidence {
            None | Some(Value::Null) => clamp_confidence(
                self.oracle
                    .node_confidence(node_id)
                    .unwrap_or(DEFAULT_RELPOSE_CONFIDENCE),
            ),
            Some(raw) => parse_confidence(raw),
        }
    }
}

fn miss(result: &mut VisibilityResult, reason: &str, note: String) {
    result.is_visible = false;
    result.confidence = 0.0;
    result.distance_m = None;
    result.bearing_rad = None;
    result.evidence.reason = reason.to_string();
    result.evidence.extra.insert("note".into(), json!(note));
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Numbers, numeric strings and booleans are accepted; anything else is 0.
fn parse_confidence(raw: &Value) -> f64 {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.map(clamp_confidence).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_gate(map: &[(NodeId, f64)]) -> PerceptionGate {
        let oracle = map
            .iter()
            .fold(OracleConfig::new(), |o, (id, c)| o.with_node(*id, *c));
        PerceptionGate::new(PerceptionBackend::NodeOracle, oracle)
    }

    fn relpose_gate(entry: RelPoseEntry) -> PerceptionGate {
        PerceptionGate::new(
            PerceptionBackend::NodeOracleRelpose,
            OracleConfig::new().with_relpose("red backpack", 5, entry),
        )
    }

    #[test]
    fn node_oracle_hit_and_miss() {
        let gate = node_gate(&[(5, 0.9), (7, 0.75)]);

        let hit = gate.check("red backpack", Some(5)).result;
        assert!(hit.is_visible);
        assert_eq!(hit.confidence, 0.9);
        assert_eq!(hit.backend, "node_oracle");
        assert_eq!(hit.evidence.reason, "oracle_hit");
        assert_eq!(hit.evidence.node_id, Some(5));
        assert_eq!(hit.evidence.extra["oracle_confidence"], json!(0.9));

        let miss = gate.check("red backpack", Some(6)).result;
        assert!(!miss.is_visible);
        assert_eq!(miss.confidence, 0.0);
        assert_eq!(miss.evidence.reason, "oracle_miss");
        assert_eq!(miss.evidence.extra["note"], json!("node 6 not in oracle map"));
    }

    #[test]
    fn node_oracle_without_location() {
        let r = node_gate(&[(5, 0.9)]).check("red backpack", None).result;
        assert!(!r.is_visible);
        assert_eq!(r.evidence.node_id, None);
        assert_eq!(r.evidence.extra["note"], json!("current_node_id is None"));
    }

    #[test]
    fn out_of_range_oracle_value_becomes_exception() {
        let r = node_gate(&[(5, 1.5)]).check("red backpack", Some(5)).result;
        assert!(!r.is_visible);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.evidence.reason, "exception");
        assert_eq!(r.evidence.extra["exception_type"], json!("InvalidOracleConfidence"));
        assert!(r.evidence.extra.contains_key("error"));
    }

    #[test]
    fn relpose_hit_reports_geometry() {
        let gate = relpose_gate(RelPoseEntry::new(2.0, 0.3).with_confidence(0.8));
        let r = gate.check("  Red   Backpack ", Some(5)).result;
        assert!(r.is_visible);
        assert_eq!(r.confidence, 0.8);
        assert_eq!(r.distance_m, Some(2.0));
        assert_eq!(r.bearing_rad, Some(0.3));
        assert_eq!(r.target_goal_key.as_deref(), Some("red backpack"));
        assert_eq!(r.evidence.reason, "relpose_hit");
        assert_eq!(r.evidence.extra["goal_key"], json!("red backpack"));
    }

    #[test]
    fn relpose_confidence_is_clamped() {
        let high = relpose_gate(RelPoseEntry::new(1.0, 0.0).with_confidence(1.5));
        assert_eq!(high.check("red backpack", Some(5)).result.confidence, 1.0);

        let low = relpose_gate(RelPoseEntry::new(1.0, 0.0).with_confidence(-0.5));
        let r = low.check("red backpack", Some(5)).result;
        assert_eq!(r.confidence, 0.0);
        assert!(!r.is_visible);
    }

    #[test]
    fn non_numeric_confidence_collapses_to_zero() {
        let gate = relpose_gate(RelPoseEntry::new(1.0, 0.0).with_confidence("very sure"));
        let r = gate.check("red backpack", Some(5)).result;
        assert_eq!(r.confidence, 0.0);
        assert!(!r.is_visible);
        assert_eq!(r.evidence.reason, "relpose_hit");

        let gate = relpose_gate(RelPoseEntry::new(1.0, 0.0).with_confidence(json!([0.9])));
        assert_eq!(gate.check("red backpack", Some(5)).result.confidence, 0.0);

        let gate = relpose_gate(RelPoseEntry::new(1.0, 0.0).with_confidence("0.4"));
        assert_eq!(gate.check("red backpack", Some(5)).result.confidence, 0.4);
    }

    #[test]
    fn missing_relpose_confidence_falls_back() {
        let gate = relpose_gate(RelPoseEntry::new(1.0, 0.0));
        assert_eq!(gate.check("red backpack", Some(5)).result.confidence, 1.0);

        let oracle = OracleConfig::new()
            .with_node(5, 0.6)
            .with_relpose("red backpack", 5, RelPoseEntry::new(1.0, 0.0));
        let gate = PerceptionGate::new(PerceptionBackend::NodeOracleRelpose, oracle);
        assert_eq!(gate.check("red backpack", Some(5)).result.confidence, 0.6);
    }

    #[test]
    fn relpose_misses_clear_geometry() {
        let gate = relpose_gate(RelPoseEntry::new(2.0, 0.3));

        let other_node = gate.check("red backpack", Some(6)).result;
        assert_eq!(other_node.evidence.reason, "relpose_miss");
        assert_eq!(other_node.distance_m, None);
        assert_eq!(other_node.bearing_rad, None);
        assert_eq!(
            other_node.evidence.extra["note"],
            json!("node 6 not mapped for goal 'red backpack'")
        );

        let other_goal = gate.check("blue mug", Some(5)).result;
        assert_eq!(
            other_goal.evidence.extra["note"],
            json!("goal_key 'blue mug' not in relpose map")
        );

        let nowhere = gate.check("red backpack", None).result;
        assert_eq!(nowhere.evidence.reason, "relpose_miss");
        assert_eq!(nowhere.target_goal_key.as_deref(), Some("red backpack"));
    }

    #[test]
    fn non_finite_geometry_becomes_exception() {
        let gate = relpose_gate(RelPoseEntry::new(f64::INFINITY, 0.0));
        let r = gate.check("red backpack", Some(5)).result;
        assert_eq!(r.evidence.reason, "exception");
        assert_eq!(r.evidence.extra["exception_type"], json!("InvalidRelPose"));
        assert!(!r.is_visible);
        assert_eq!(r.distance_m, None);
    }

    #[test]
    fn report_carries_latency_and_backend() {
        let report = node_gate(&[]).check("anything", Some(1));
        assert!(report.latency_ms >= 0.0);
        assert_eq!(report.result.backend, "node_oracle");
        assert_eq!(PerceptionBackend::NodeOracleRelpose.to_string(), "node_oracle_relpose");
    }
}
