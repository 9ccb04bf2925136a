//! `seeker-kernel` – Admission control for untrusted hypotheses.
//!
//! It does not think; it decides what is allowed through.
//!
//! # Modules
//!
//! - [`validator`] – [`HypothesisValidator`][validator::HypothesisValidator]:
//!   a rule engine that checks a structured object against the hypothesis
//!   contract (required fields, enumerations, ranges, length caps and the
//!   conditional requirements tied to `action`) and yields a typed
//!   [`Hypothesis`][seeker_types::Hypothesis] or a structured
//!   [`ValidationError`][validator::ValidationError].
//! - [`rng`] – [`RunRng`][rng::RunRng]: the single seeded random stream of a
//!   run, passed explicitly to every consumer.
//! - [`verifier`] – [`SimulatedVerifier`][verifier::SimulatedVerifier]:
//!   seeded stand-in for geometric admissibility checking.
//! - [`gate`] – [`HypothesisGate`][gate::HypothesisGate]: parse, validate and
//!   verify a raw hypothesis in one call.

pub mod gate;
pub mod rng;
pub mod validator;
pub mod verifier;

pub use gate::{GateOutcome, HypothesisGate, RawHypothesis, VlmStatus};
pub use rng::RunRng;
pub use validator::{HypothesisValidator, Rule, ValidationError, ValidationErrorKind};
pub use verifier::{SimulatedVerifier, VerifierOdds};
