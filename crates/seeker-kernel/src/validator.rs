//! [`HypothesisValidator`] – contract check for untrusted hypotheses.
//!
//! Model output is parsed into a JSON object and then passed through
//! [`HypothesisValidator::validate`]. Every registered [`Rule`] is evaluated
//! in order; the first violation is returned as a [`ValidationError`] of kind
//! [`Schema`][ValidationErrorKind::Schema] carrying a human-readable message,
//! the offending field path and the schema path of the violated constraint.
//! Only an object that passes every rule is converted into a typed
//! [`Hypothesis`].
//!
//! The default rule set enforces:
//!
//! | Rule | Constraint |
//! |------|------------|
//! | [`RequiredFields`] | `target_status`, `action`, `confidence`, `rationale` present |
//! | [`EnumField`] | `target_status` / `action` within their enumerations |
//! | [`ConfidenceRange`] | `confidence` is a number in `[0, 1]` |
//! | [`MaxLength`] | `rationale` ≤ 240 chars, `clarification_question` ≤ 160 chars |
//! | [`NavigationGoalShape`] | a present `navigation_goal` is a well-formed variant |
//! | [`ActionRequirements`] | `goto_node` ⇒ `node_id` goal, `approach` ⇒ `pose_relative` goal, `ask_clarification` ⇒ question |
//!
//! # Example
//!
//! ```
//! use seeker_kernel::validator::HypothesisValidator;
//! use serde_json::json;
//!
//! let validator = HypothesisValidator::default();
//!
//! let ok = json!({
//!     "target_status": "not_visible",
//!     "action": "explore",
//!     "confidence": 0.6,
//!     "rationale": "Searching for target"
//! });
//! assert!(validator.validate(&ok).is_ok());
//!
//! let missing_goal = json!({
//!     "target_status": "visible",
//!     "action": "goto_node",
//!     "confidence": 0.9,
//!     "rationale": "Target at node"
//! });
//! assert!(validator.validate(&missing_goal).is_err());
//! ```

use seeker_types::Hypothesis;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Maximum length of `rationale`, in characters.
pub const RATIONALE_MAX_CHARS: usize = 240;
/// Maximum length of `clarification_question`, in characters.
pub const CLARIFICATION_MAX_CHARS: usize = 160;

const TARGET_STATUSES: [&str; 3] = ["visible", "not_visible", "ambiguous"];
const ACTIONS: [&str; 6] = [
    "approach",
    "explore",
    "rotate",
    "goto_node",
    "ask_clarification",
    "stop",
];

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// The raw output was not parseable JSON.
    JsonParse,
    /// The object violated the hypothesis contract.
    Schema,
}

/// Why a raw hypothesis was rejected.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ValidationError {
    #[serde(rename = "type")]
    pub kind: ValidationErrorKind,
    pub message: String,
    /// Path to the offending field in the instance, e.g. `["navigation_goal", "node_id"]`.
    pub path: Vec<String>,
    /// Path to the violated constraint, e.g. `["properties", "confidence", "maximum"]`.
    pub schema_path: Vec<String>,
}

impl ValidationError {
    pub fn schema(message: impl Into<String>, path: &[&str], schema_path: &[&str]) -> Self {
        Self {
            kind: ValidationErrorKind::Schema,
            message: message.into(),
            path: path.iter().map(|s| s.to_string()).collect(),
            schema_path: schema_path.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn json_parse(message: impl Into<String>) -> Self {
        Self {
            kind: ValidationErrorKind::JsonParse,
            message: message.into(),
            path: Vec::new(),
            schema_path: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule trait
// ─────────────────────────────────────────────────────────────────────────────

/// A single constraint of the hypothesis contract.
pub trait Rule: Send + Sync {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Return `Ok(())` when `obj` satisfies the constraint.
    fn check(&self, obj: &Map<String, Value>) -> Result<(), ValidationError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// HypothesisValidator
// ─────────────────────────────────────────────────────────────────────────────

/// Rule engine for the hypothesis contract.
pub struct HypothesisValidator {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for HypothesisValidator {
    /// Validator loaded with the full hypothesis contract.
    fn default() -> Self {
        let mut v = Self::empty();
        v.add_rule(Box::new(RequiredFields {
            fields: vec!["target_status", "action", "confidence", "rationale"],
        }));
        v.add_rule(Box::new(EnumField {
            field: "target_status",
            allowed: &TARGET_STATUSES,
        }));
        v.add_rule(Box::new(EnumField {
            field: "action",
            allowed: &ACTIONS,
        }));
        v.add_rule(Box::new(ConfidenceRange));
        v.add_rule(Box::new(MaxLength {
            field: "rationale",
            max_chars: RATIONALE_MAX_CHARS,
        }));
        v.add_rule(Box::new(MaxLength {
            field: "clarification_question",
            max_chars: CLARIFICATION_MAX_CHARS,
        }));
        v.add_rule(Box::new(NavigationGoalShape));
        v.add_rule(Box::new(ActionRequirements));
        v
    }
}

impl HypothesisValidator {
    /// A validator with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Register a new [`Rule`]. Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Names of the registered rules, in evaluation order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validate `instance` and convert it into a typed [`Hypothesis`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    pub fn validate(&self, instance: &Value) -> Result<Hypothesis, ValidationError> {
        let obj = instance.as_object().ok_or_else(|| {
            ValidationError::schema(
                format!("{instance} is not of type 'object'"),
                &[],
                &["type"],
            )
        })?;
        for rule in &self.rules {
            rule.check(obj)?;
        }
        serde_json::from_value(instance.clone())
            .map_err(|e| ValidationError::schema(e.to_string(), &[], &[]))
    }

    /// `true` if `instance` passes every rule.
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validate(instance).is_ok()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ─────────────────────────────────────────────────────────────────────────────

/// Rejects objects missing any of `fields`.
pub struct RequiredFields {
    pub fields: Vec<&'static str>,
}

impl Rule for RequiredFields {
    fn name(&self) -> &str {
        "required_fields"
    }

    fn check(&self, obj: &Map<String, Value>) -> Result<(), ValidationError> {
        match self.fields.iter().find(|f| !obj.contains_key(**f)) {
            Some(missing) => Err(ValidationError::schema(
                format!("'{missing}' is a required property"),
                &[],
                &["required"],
            )),
            None => Ok(()),
        }
    }
}

/// Rejects a string field whose value is outside `allowed`.
pub struct EnumField {
    pub field: &'static str,
    pub allowed: &'static [&'static str],
}

impl Rule for EnumField {
    fn name(&self) -> &str {
        "enum_field"
    }

    fn check(&self, obj: &Map<String, Value>) -> Result<(), ValidationError> {
        let Some(value) = obj.get(self.field) else {
            return Ok(());
        };
        match value.as_str() {
            Some(s) if self.allowed.contains(&s) => Ok(()),
            _ => Err(ValidationError::schema(
                format!("{value} is not one of {:?}", self.allowed),
                &[self.field],
                &["properties", self.field, "enum"],
            )),
        }
    }
}

/// Rejects a `confidence` that is not a number in `[0, 1]`.
pub struct ConfidenceRange;

impl Rule for ConfidenceRange {
    fn name(&self) -> &str {
        "confidence_range"
    }

    fn check(&self, obj: &Map<String, Value>) -> Result<(), ValidationError> {
        let Some(value) = obj.get("confidence") else {
            return Ok(());
        };
        let Some(c) = value.as_f64() else {
            return Err(ValidationError::schema(
                format!("{value} is not of type 'number'"),
                &["confidence"],
                &["properties", "confidence", "type"],
            ));
        };
        if c < 0.0 {
            return Err(ValidationError::schema(
                format!("{c} is less than the minimum of 0"),
                &["confidence"],
                &["properties", "confidence", "minimum"],
            ));
        }
        if c > 1.0 {
            return Err(ValidationError::schema(
                format!("{c} is greater than the maximum of 1"),
                &["confidence"],
                &["properties", "confidence", "maximum"],
            ));
        }
        Ok(())
    }
}

/// Rejects a present string field longer than `max_chars`, or a non-string.
pub struct MaxLength {
    pub field: &'static str,
    pub max_chars: usize,
}

impl Rule for MaxLength {
    fn name(&self) -> &str {
        "max_length"
    }

    fn check(&self, obj: &Map<String, Value>) -> Result<(), ValidationError> {
        let Some(value) = obj.get(self.field) else {
            return Ok(());
        };
        let Some(s) = value.as_str() else {
            return Err(ValidationError::schema(
                format!("{value} is not of type 'string'"),
                &[self.field],
                &["properties", self.field, "type"],
            ));
        };
        if s.chars().count() > self.max_chars {
            return Err(ValidationError::schema(
                format!("'{}' is too long (max {} chars)", self.field, self.max_chars),
                &[self.field],
                &["properties", self.field, "maxLength"],
            ));
        }
        Ok(())
    }
}

/// Rejects a present `navigation_goal` that is not one of the two variants.
pub struct NavigationGoalShape;

impl NavigationGoalShape {
    fn require_number(
        goal: &Map<String, Value>,
        field: &'static str,
        non_negative: bool,
    ) -> Result<(), ValidationError> {
        let path = ["navigation_goal", field];
        match goal.get(field) {
            None => Err(ValidationError::schema(
                format!("'{field}' is a required property"),
                &["navigation_goal"],
                &["definitions", "pose_relative", "required"],
            )),
            Some(v) => match v.as_f64() {
                None => Err(ValidationError::schema(
                    format!("{v} is not of type 'number'"),
                    &path,
                    &["definitions", "pose_relative", "properties", field, "type"],
                )),
                Some(n) if non_negative && n < 0.0 => Err(ValidationError::schema(
                    format!("{n} is less than the minimum of 0"),
                    &path,
                    &["definitions", "pose_relative", "properties", field, "minimum"],
                )),
                Some(_) => Ok(()),
            },
        }
    }
}

impl Rule for NavigationGoalShape {
    fn name(&self) -> &str {
        "navigation_goal_shape"
    }

    fn check(&self, obj: &Map<String, Value>) -> Result<(), ValidationError> {
        let Some(value) = obj.get("navigation_goal") else {
            return Ok(());
        };
        let Some(goal) = value.as_object() else {
            return Err(ValidationError::schema(
                format!("{value} is not of type 'object'"),
                &["navigation_goal"],
                &["properties", "navigation_goal", "type"],
            ));
        };
        match goal.get("type").and_then(Value::as_str) {
            Some("node_id") => match goal.get("node_id") {
                Some(id) if id.as_u64().is_some() => Ok(()),
                Some(id) => Err(ValidationError::schema(
                    format!("{id} is not a non-negative integer"),
                    &["navigation_goal", "node_id"],
                    &["definitions", "node_id", "properties", "node_id", "type"],
                )),
                None => Err(ValidationError::schema(
                    "'node_id' is a required property",
                    &["navigation_goal"],
                    &["definitions", "node_id", "required"],
                )),
            },
            Some("pose_relative") => {
                Self::require_number(goal, "distance_meters", true)?;
                Self::require_number(goal, "angle_degrees", false)?;
                Self::require_number(goal, "standoff_distance", true)
            }
            _ => Err(ValidationError::schema(
                format!(
                    "{} is not one of [\"node_id\", \"pose_relative\"]",
                    goal.get("type").unwrap_or(&Value::Null)
                ),
                &["navigation_goal", "type"],
                &["properties", "navigation_goal", "oneOf"],
            )),
        }
    }
}

/// Conditional requirements tied to `action`.
pub struct ActionRequirements;

impl Rule for ActionRequirements {
    fn name(&self) -> &str {
        "action_requirements"
    }

    fn check(&self, obj: &Map<String, Value>) -> Result<(), ValidationError> {
        let goal_type = obj
            .get("navigation_goal")
            .and_then(|g| g.get("type"))
            .and_then(Value::as_str);
        let required_goal = match obj.get("action").and_then(Value::as_str) {
            Some("goto_node") => Some("node_id"),
            Some("approach") => Some("pose_relative"),
            Some("ask_clarification") => {
                if !obj.contains_key("clarification_question") {
                    return Err(ValidationError::schema(
                        "'clarification_question' is a required property",
                        &[],
                        &["allOf", "ask_clarification", "then", "required"],
                    ));
                }
                None
            }
            _ => None,
        };
        let Some(required) = required_goal else {
            return Ok(());
        };
        match goal_type {
            None => Err(ValidationError::schema(
                "'navigation_goal' is a required property",
                &[],
                &["allOf", required, "then", "required"],
            )),
            Some(t) if t != required => Err(ValidationError::schema(
                format!("navigation_goal of type '{t}' does not match required type '{required}'"),
                &["navigation_goal", "type"],
                &["allOf", required, "then", "properties", "navigation_goal", "type"],
            )),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeker_types::{Action, NavigationGoal, TargetStatus};
    use serde_json::json;

    fn validator() -> HypothesisValidator {
        HypothesisValidator::default()
    }

    fn base(action: &str) -> Value {
        json!({
            "target_status": "visible",
            "action": action,
            "confidence": 0.8,
            "rationale": "test"
        })
    }

    #[test]
    fn simple_actions_need_no_extras() {
        for action in ["explore", "rotate", "stop"] {
            assert!(validator().is_valid(&base(action)), "{action} should validate");
        }
    }

    #[test]
    fn valid_goto_node_yields_typed_hypothesis() {
        let mut v = base("goto_node");
        v["navigation_goal"] = json!({"type": "node_id", "node_id": 5});
        let h = validator().validate(&v).unwrap();
        assert_eq!(h.action, Action::GotoNode);
        assert_eq!(h.target_status, TargetStatus::Visible);
        assert_eq!(h.navigation_goal, Some(NavigationGoal::NodeId { node_id: 5 }));
    }

    #[test]
    fn missing_required_field_is_reported() {
        let err = validator()
            .validate(&json!({"target_status": "visible", "action": "explore"}))
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Schema);
        assert!(err.message.contains("'confidence' is a required property"));
        assert_eq!(err.schema_path, vec!["required"]);
    }

    #[test]
    fn non_object_is_rejected() {
        let err = validator().validate(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.schema_path, vec!["type"]);
    }

    #[test]
    fn unknown_enum_values_are_rejected() {
        let mut v = base("fly");
        assert_eq!(validator().validate(&v).unwrap_err().path, vec!["action"]);
        v["action"] = json!("explore");
        v["target_status"] = json!("done");
        let err = validator().validate(&v).unwrap_err();
        assert_eq!(err.path, vec!["target_status"]);
        assert_eq!(err.schema_path, vec!["properties", "target_status", "enum"]);
    }

    #[test]
    fn confidence_must_be_a_number_in_range() {
        let mut v = base("explore");
        v["confidence"] = json!(1.5);
        assert!(validator().validate(&v).unwrap_err().message.contains("maximum"));
        v["confidence"] = json!(-0.1);
        assert!(validator().validate(&v).unwrap_err().message.contains("minimum"));
        v["confidence"] = json!("high");
        assert!(validator().validate(&v).unwrap_err().message.contains("number"));
        v["confidence"] = json!(1);
        assert!(validator().is_valid(&v));
    }

    #[test]
    fn long_strings_are_rejected() {
        let mut v = base("explore");
        v["rationale"] = json!("x".repeat(241));
        assert_eq!(validator().validate(&v).unwrap_err().path, vec!["rationale"]);
        v["rationale"] = json!("x".repeat(240));
        assert!(validator().is_valid(&v));

        let mut q = base("ask_clarification");
        q["clarification_question"] = json!("?".repeat(161));
        assert_eq!(
            validator().validate(&q).unwrap_err().path,
            vec!["clarification_question"]
        );
    }

    #[test]
    fn goto_node_requires_node_goal() {
        let v = base("goto_node");
        let err = validator().validate(&v).unwrap_err();
        assert!(err.message.contains("navigation_goal"));

        let mut mismatched = base("goto_node");
        mismatched["navigation_goal"] = json!({
            "type": "pose_relative",
            "distance_meters": 1.0,
            "angle_degrees": 0.0,
            "standoff_distance": 0.5
        });
        let err = validator().validate(&mismatched).unwrap_err();
        assert!(err.message.contains("does not match"));
    }

    #[test]
    fn approach_requires_pose_relative_goal() {
        let mut v = base("approach");
        assert!(!validator().is_valid(&v));
        v["navigation_goal"] = json!({"type": "node_id", "node_id": 2});
        assert!(!validator().is_valid(&v));
        v["navigation_goal"] = json!({
            "type": "pose_relative",
            "distance_meters": 2.0,
            "angle_degrees": 45.0,
            "standoff_distance": 0.5
        });
        assert!(validator().is_valid(&v));
    }

    #[test]
    fn ask_clarification_requires_question() {
        let mut v = base("ask_clarification");
        v["target_status"] = json!("ambiguous");
        assert!(!validator().is_valid(&v));
        v["clarification_question"] = json!("Which red backpack?");
        assert!(validator().is_valid(&v));
    }

    #[test]
    fn malformed_goals_are_rejected_for_any_action() {
        let mut v = base("explore");
        v["navigation_goal"] = json!({"type": "teleport"});
        assert!(!validator().is_valid(&v));
        v["navigation_goal"] = json!({"type": "node_id", "node_id": -3});
        assert!(!validator().is_valid(&v));
        v["navigation_goal"] = json!({"type": "node_id", "node_id": 2.5});
        assert!(!validator().is_valid(&v));
        v["navigation_goal"] = json!({"type": "pose_relative", "distance_meters": 1.0});
        let err = validator().validate(&v).unwrap_err();
        assert!(err.message.contains("angle_degrees"));
        v["navigation_goal"] = json!("node 3");
        assert!(!validator().is_valid(&v));
    }

    #[test]
    fn default_rule_order() {
        assert_eq!(
            validator().rule_names(),
            vec![
                "required_fields",
                "enum_field",
                "enum_field",
                "confidence_range",
                "max_length",
                "max_length",
                "navigation_goal_shape",
                "action_requirements"
            ]
        );
    }

    #[test]
    fn empty_validator_still_requires_typed_shape() {
        let v = HypothesisValidator::empty();
        assert!(v.validate(&json!({"action": "explore"})).is_err());
    }
}
