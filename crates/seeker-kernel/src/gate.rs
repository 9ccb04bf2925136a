//! [`HypothesisGate`] – single admission point for raw hypotheses.
//!
//! A raw hypothesis produced by any backend must pass through
//! [`HypothesisGate::admit`] before the belief controller may act on it. The
//! gate runs three stages in order:
//!
//! 1. **Parse**: text is parsed strictly as JSON; failure is a
//!    [`ValidationErrorKind::JsonParse`] error and the status is
//!    [`VlmStatus::ParseFail`].
//! 2. **Validate** ([`HypothesisValidator`]): the object must satisfy the
//!    hypothesis contract; failure is [`VlmStatus::SchemaBad`].
//! 3. **Verify** ([`SimulatedVerifier`]): only a validated hypothesis is
//!    verified; otherwise the verifier result is `SKIPPED` and no random draw
//!    is consumed.
//!
//! # Example
//!
//! ```
//! use seeker_kernel::{HypothesisGate, RawHypothesis, RunRng, VerifierOdds, VlmStatus};
//!
//! let gate = HypothesisGate::with_odds(VerifierOdds::always_ok());
//! let mut rng = RunRng::from_seed(42);
//!
//! let garbage = RawHypothesis::Text("{ this is not json".into());
//! let outcome = gate.admit(&garbage, &mut rng);
//! assert_eq!(outcome.status, VlmStatus::ParseFail);
//! assert_eq!(outcome.rejection_reason().as_deref(), Some("VLM_INVALID:json_parse"));
//! assert_eq!(rng.draws(), 0);
//! ```

use std::fmt;
use std::time::Instant;

use seeker_types::{Hypothesis, VerifierResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::rng::RunRng;
use crate::validator::{HypothesisValidator, ValidationError, ValidationErrorKind};
use crate::verifier::{SimulatedVerifier, VerifierOdds};

/// Untrusted backend output: either text or an already-structured object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawHypothesis {
    Text(String),
    Structured(Value),
}

impl RawHypothesis {
    /// Strictly parse into a JSON value.
    pub fn parse(&self) -> Result<Value, ValidationError> {
        match self {
            RawHypothesis::Structured(v) => Ok(v.clone()),
            RawHypothesis::Text(s) => {
                serde_json::from_str(s).map_err(|e| ValidationError::json_parse(e.to_string()))
            }
        }
    }
}

impl From<Hypothesis> for RawHypothesis {
    fn from(h: Hypothesis) -> Self {
        RawHypothesis::Structured(serde_json::to_value(h).unwrap_or(Value::Null))
    }
}

/// Diagnostic classification of a raw hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VlmStatus {
    Valid,
    ParseFail,
    SchemaBad,
}

impl VlmStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VlmStatus::Valid => "VALID",
            VlmStatus::ParseFail => "PARSE_FAIL",
            VlmStatus::SchemaBad => "SCHEMA_BAD",
        }
    }
}

impl fmt::Display for VlmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the gate learned about one raw hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub validated: Option<Hypothesis>,
    pub validation_error: Option<ValidationError>,
    pub verifier_result: VerifierResult,
    pub status: VlmStatus,
    pub verify_latency_ms: f64,
}

impl GateOutcome {
    /// `true` when the hypothesis validated and its path verified.
    pub fn accepted(&self) -> bool {
        self.validated.is_some() && self.verifier_result.ok
    }

    /// Rejection reason recorded in the belief; `None` when accepted.
    pub fn rejection_reason(&self) -> Option<String> {
        match &self.validation_error {
            Some(e) if e.kind == ValidationErrorKind::JsonParse => {
                Some("VLM_INVALID:json_parse".to_string())
            }
            Some(_) => Some("VLM_INVALID:schema".to_string()),
            None if self.verifier_result.ok => None,
            None => Some(self.verifier_result.reason_code.as_str().to_string()),
        }
    }
}

#[derive(Default)]
pub struct HypothesisGate {
    validator: HypothesisValidator,
    verifier: SimulatedVerifier,
}

impl HypothesisGate {
    pub fn new(validator: HypothesisValidator, verifier: SimulatedVerifier) -> Self {
        Self {
            validator,
            verifier,
        }
    }

    /// Default contract with custom verifier odds.
    pub fn with_odds(odds: VerifierOdds) -> Self {
        Self::new(HypothesisValidator::default(), SimulatedVerifier::new(odds))
    }

    pub fn validator(&self) -> &HypothesisValidator {
        &self.validator
    }

    /// Parse, validate and verify `raw`.
    pub fn admit(&self, raw: &RawHypothesis, rng: &mut RunRng) -> GateOutcome {
        let checked = raw
            .parse()
            .and_then(|value| self.validator.validate(&value));

        let (validated, validation_error, status) = match checked {
            Ok(h) => (Some(h), None, VlmStatus::Valid),
            Err(e) => {
                let status = match e.kind {
                    ValidationErrorKind::JsonParse => VlmStatus::ParseFail,
                    ValidationErrorKind::Schema => VlmStatus::SchemaBad,
                };
                debug!(%status, error = %e.message, "hypothesis rejected");
                (None, Some(e), status)
            }
        };

        let started = Instant::now();
        let verifier_result = match &validated {
            Some(h) => self.verifier.verify(h, rng),
            None => VerifierResult::skipped(),
        };
        let verify_latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        GateOutcome {
            validated,
            validation_error,
            verifier_result,
            status,
            verify_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeker_types::{Action, ReasonCode};
    use serde_json::json;

    fn gate(odds: VerifierOdds) -> HypothesisGate {
        HypothesisGate::with_odds(odds)
    }

    #[test]
    fn valid_text_is_admitted() {
        let raw = RawHypothesis::Text(
            r#"{"target_status":"not_visible","action":"rotate","confidence":0.7,"rationale":"Scanning environment"}"#
                .into(),
        );
        let mut rng = RunRng::from_seed(1);
        let out = gate(VerifierOdds::always_ok()).admit(&raw, &mut rng);
        assert_eq!(out.status, VlmStatus::Valid);
        assert_eq!(out.validated.as_ref().map(|h| h.action), Some(Action::Rotate));
        assert!(out.accepted());
        assert_eq!(out.rejection_reason(), None);
        assert_eq!(rng.draws(), 1);
    }

    #[test]
    fn schema_violation_skips_verifier() {
        let raw = RawHypothesis::Structured(json!({"target_status": "visible", "action": "explore"}));
        let mut rng = RunRng::from_seed(1);
        let out = gate(VerifierOdds::default()).admit(&raw, &mut rng);
        assert_eq!(out.status, VlmStatus::SchemaBad);
        assert_eq!(out.verifier_result.reason_code, ReasonCode::Skipped);
        assert_eq!(out.rejection_reason().as_deref(), Some("VLM_INVALID:schema"));
        assert!(!out.accepted());
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn failed_verification_reports_reason_code() {
        let raw: RawHypothesis = Hypothesis {
            target_status: seeker_types::TargetStatus::NotVisible,
            action: Action::Explore,
            confidence: 0.3,
            rationale: "Exploring for target".into(),
            navigation_goal: None,
            clarification_question: None,
        }
        .into();
        let out = gate(VerifierOdds { ok: 0.0, collision: 1.0 }).admit(&raw, &mut RunRng::from_seed(5));
        assert_eq!(out.status, VlmStatus::Valid);
        assert!(!out.accepted());
        assert_eq!(out.rejection_reason().as_deref(), Some("COLLISION_DETECTED"));
    }

    #[test]
    fn raw_hypothesis_deserializes_untagged() {
        let t: RawHypothesis = serde_json::from_value(json!("{ this is not json")).unwrap();
        assert!(matches!(t, RawHypothesis::Text(_)));
        let s: RawHypothesis = serde_json::from_value(json!({"action": "stop"})).unwrap();
        assert!(matches!(s, RawHypothesis::Structured(_)));
    }

    #[test]
    fn status_labels() {
        assert_eq!(VlmStatus::ParseFail.to_string(), "PARSE_FAIL");
        assert_eq!(serde_json::to_value(VlmStatus::SchemaBad).unwrap(), json!("SCHEMA_BAD"));
    }
}
