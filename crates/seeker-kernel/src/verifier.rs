//! [`SimulatedVerifier`] – seeded stand-in for geometric path checking.
//!
//! One draw from the run's [`RunRng`] per call selects the outcome:
//!
//! | Roll | Result |
//! |------|--------|
//! | `< ok` | `OK` – "Path verified successfully" |
//! | `< ok + collision` | `COLLISION_DETECTED` – "Collision detected in planned path" |
//! | otherwise | `CONSTRAINT_VIOLATION` – "Path violates active constraints" |

use std::collections::BTreeMap;

use seeker_types::{Hypothesis, ReasonCode, VerifierResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::rng::RunRng;

/// Outcome probabilities. The remainder after `ok + collision` is the
/// constraint-violation share.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerifierOdds {
    pub ok: f64,
    pub collision: f64,
}

impl Default for VerifierOdds {
    fn default() -> Self {
        Self {
            ok: 0.8,
            collision: 0.1,
        }
    }
}

impl VerifierOdds {
    /// Odds under which every hypothesis verifies.
    pub fn always_ok() -> Self {
        Self {
            ok: 1.0,
            collision: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedVerifier {
    odds: VerifierOdds,
}

impl SimulatedVerifier {
    pub fn new(odds: VerifierOdds) -> Self {
        Self { odds }
    }

    pub fn odds(&self) -> VerifierOdds {
        self.odds
    }

    /// Verify a validated hypothesis. Consumes exactly one draw from `rng`.
    pub fn verify(&self, hypothesis: &Hypothesis, rng: &mut RunRng) -> VerifierResult {
        let roll = rng.roll();
        let (ok, reason_code, note) = if roll < self.odds.ok {
            (true, ReasonCode::Ok, "Path verified successfully")
        } else if roll < self.odds.ok + self.odds.collision {
            (false, ReasonCode::CollisionDetected, "Collision detected in planned path")
        } else {
            (false, ReasonCode::ConstraintViolation, "Path violates active constraints")
        };
        debug!(action = %hypothesis.action, reason = %reason_code, roll, "verifier outcome");
        let mut details = BTreeMap::new();
        details.insert("note".to_string(), json!(note));
        VerifierResult {
            ok,
            reason_code,
            details,
        }
    }
}
