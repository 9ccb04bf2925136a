//! `seeker-memory` – The topological memory.
//!
//! Remembered locations and the machinery to rank them against a goal.
//!
//! # Modules
//!
//! - [`tokenize`] – lowercase, punctuation-stripped token sequences.
//! - [`embedding`] – [`DeterministicEmbedder`][embedding::DeterministicEmbedder]:
//!   hash-seeded unit vectors, a pure function of the normalized text.
//! - [`store`] – the [`MemoryStore`][store::MemoryStore] collaborator with an
//!   in-memory implementation and a SQLite-backed one.
//! - [`retrieval`] – [`retrieve_candidates`][retrieval::retrieve_candidates]:
//!   hybrid embedding/keyword scoring with deterministic tie-breaking.

pub mod embedding;
pub mod retrieval;
pub mod store;
pub mod tokenize;

pub use embedding::DeterministicEmbedder;
pub use retrieval::{cosine_similarity, retrieve_candidates};
pub use store::{InMemoryNodeStore, MemoryError, MemoryStore, SqliteNodeStore};
pub use tokenize::tokenize;
