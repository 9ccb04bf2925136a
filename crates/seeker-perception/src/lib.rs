//! `seeker-perception` – the visibility authority.
//!
//! Model output never moves the belief toward `visible` or `done`; only the
//! perception gate does. Real vision is out of scope, so both backends read
//! from oracle tables that stand in for ground truth.
//!
//! # Modules
//!
//! - [`goal`] – [`normalize_goal_text`][goal::normalize_goal_text]: canonical
//!   goal keys for oracle lookups.
//! - [`oracle`] – [`OracleConfig`][oracle::OracleConfig]: the node-indexed
//!   confidence table and the goal-keyed relative-pose table.
//! - [`gate`] – [`PerceptionGate`][gate::PerceptionGate]: answers "is the
//!   target visible here?" with a [`VisibilityResult`][seeker_types::VisibilityResult],
//!   converting every internal failure into a safe negative answer.

pub mod gate;
pub mod goal;
pub mod oracle;

pub use gate::{PerceptionBackend, PerceptionError, PerceptionGate, PerceptionReport};
pub use goal::normalize_goal_text;
pub use oracle::{OracleConfig, RelPoseEntry};
