//! Goal-conditioned memory retrieval.
//!
//! Every node is scored against the goal text with a hybrid metric:
//!
//! ```text
//! embedding_score = (cos(goal, node) + 1) / 2
//! keyword_score   = |goal_tokens ∩ node_tokens| / |goal_tokens|
//! score           = clamp(0.8 * embedding_score + 0.2 * keyword_score, 0, 1)
//! ```
//!
//! When no keyword matches and the embedding score sits within
//! [`NOISE_BAND`] of 0.5 the embedding carries no real signal, so the score is
//! halved. Results are sorted by descending score, ties broken by ascending
//! node id, and truncated to `k`.

use std::cmp::Ordering;
use std::collections::HashSet;

use seeker_types::Candidate;
use tracing::debug;

use crate::embedding::DeterministicEmbedder;
use crate::store::{MemoryError, MemoryStore};
use crate::tokenize::tokenize;

/// Weight of the embedding component in the blended score.
pub const EMBEDDING_WEIGHT: f64 = 0.8;
/// Weight of the keyword-overlap component in the blended score.
pub const KEYWORD_WEIGHT: f64 = 0.2;
/// Half-width of the band around 0.5 treated as embedding noise.
pub const NOISE_BAND: f64 = 0.05;

/// Compute the cosine similarity between two equal-length vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` if either vector has zero norm
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Blend an embedding score and a keyword score into a final score.
pub fn blend_scores(embedding_score: f64, keyword_score: f64) -> f64 {
    let mut score =
        (EMBEDDING_WEIGHT * embedding_score + KEYWORD_WEIGHT * keyword_score).clamp(0.0, 1.0);
    if keyword_score == 0.0 && (embedding_score - 0.5).abs() <= NOISE_BAND {
        score *= 0.5;
    }
    score
}

/// Rank the store's nodes against `goal_text` and return the top `k`.
///
/// A goal that tokenizes to nothing yields an empty list without embedding
/// anything.
///
/// # Errors
///
/// Propagates [`MemoryError`] from the store.
pub fn retrieve_candidates(
    goal_text: &str,
    store: &dyn MemoryStore,
    embedder: &DeterministicEmbedder,
    k: usize,
) -> Result<Vec<Candidate>, MemoryError> {
    let goal_tokens = tokenize(goal_text);
    if goal_tokens.is_empty() {
        return Ok(Vec::new());
    }
    let goal_set: HashSet<&str> = goal_tokens.iter().map(String::as_str).collect();
    let goal_vec = embedder.embed_text(goal_text);

    let mut candidates: Vec<Candidate> = store
        .all_nodes()?
        .iter()
        .map(|node| {
            let text = node.search_text();
            let node_vec = match &node.embedding {
                Some(v) => v.clone(),
                None => embedder.embed_text(&text),
            };
            let cos = cosine_similarity(&goal_vec, &node_vec) as f64;
            let embedding_score = (cos + 1.0) / 2.0;

            let node_tokens: HashSet<String> = tokenize(&text).into_iter().collect();
            let overlap = goal_set.iter().filter(|t| node_tokens.contains(**t)).count();
            let keyword_score = overlap as f64 / goal_tokens.len() as f64;

            Candidate {
                node_id: node.node_id,
                score: blend_scores(embedding_score, keyword_score),
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.node_id.cmp(&b.node_id))
    });
    candidates.truncate(k);
    debug!(
        goal = goal_text,
        returned = candidates.len(),
        best = candidates.first().map(|c| c.score),
        "memory retrieval"
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryNodeStore;
    use seeker_types::Pose;

    fn store_with(nodes: &[(&[&str], &str)]) -> InMemoryNodeStore {
        let mut store = InMemoryNodeStore::new();
        for (tags, summary) in nodes {
            store
                .add_node(
                    Pose::new(0.0, 0.0, 0.0),
                    None,
                    tags.iter().map(|t| t.to_string()).collect(),
                    summary.to_string(),
                )
                .unwrap();
        }
        store
    }

    #[test]
    fn matching_tags_rank_first() {
        let store = store_with(&[
            (&["bedroom", "blue", "chair"], ""),
            (&["kitchen", "red", "backpack"], ""),
        ]);
        let out = retrieve_candidates("red backpack", &store, &DeterministicEmbedder::default(), 5)
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].node_id, 1);
        assert!(out[0].score > out[1].score);
    }

    #[test]
    fn empty_goal_returns_nothing() {
        let store = store_with(&[(&["kitchen"], "Kitchen")]);
        let e = DeterministicEmbedder::default();
        assert!(retrieve_candidates("", &store, &e, 5).unwrap().is_empty());
        assert!(retrieve_candidates("  ?! ", &store, &e, 5).unwrap().is_empty());
    }

    #[test]
    fn ties_break_by_ascending_id() {
        let store = store_with(&[
            (&["hallway"], "Hallway"),
            (&["hallway"], "Hallway"),
            (&["hallway"], "Hallway"),
        ]);
        let out = retrieve_candidates("hallway", &store, &DeterministicEmbedder::default(), 5)
            .unwrap();
        let ids: Vec<u64> = out.iter().map(|c| c.node_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(out[0].score, out[2].score);
    }

    #[test]
    fn results_are_sorted_bounded_and_truncated() {
        let store = store_with(&[
            (&["kitchen", "appliances", "counter"], "Kitchen area with counter and appliances"),
            (&["living room", "couch", "table"], "Living room with couch and coffee table"),
            (&["hallway", "corridor", "doorway"], "Hallway connecting rooms with doorways"),
            (&["bedroom", "bed", "closet"], "Bedroom with bed and closet"),
            (&["bathroom", "sink", "shower"], "Bathroom with sink and shower"),
            (&["garage", "red", "backpack"], "Garage shelf"),
        ]);
        let out = retrieve_candidates("red backpack", &store, &DeterministicEmbedder::default(), 3)
            .unwrap();
        assert_eq!(out.len(), 3);
        for c in &out {
            assert!((0.0..=1.0).contains(&c.score));
        }
        for pair in out.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].node_id < pair[1].node_id)
            );
        }
    }

    #[test]
    fn retrieval_is_deterministic() {
        let store = store_with(&[(&["kitchen"], "Kitchen"), (&["bedroom"], "Bedroom")]);
        let e = DeterministicEmbedder::default();
        let a = retrieve_candidates("kitchen counter", &store, &e, 5).unwrap();
        let b = retrieve_candidates("kitchen counter", &store, &e, 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn precomputed_embedding_is_used() {
        let e = DeterministicEmbedder::default();
        let mut store = InMemoryNodeStore::new();
        store
            .add_node(
                Pose::new(0.0, 0.0, 0.0),
                Some(e.embed_text("red backpack")),
                vec![],
                "unrelated summary".into(),
            )
            .unwrap();
        let out = retrieve_candidates("red backpack", &store, &e, 1).unwrap();
        // Identical vectors: cos = 1 → embedding score 1.0, no keyword overlap.
        assert!((out[0].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn noise_guard_halves_signal_free_scores() {
        assert!((blend_scores(0.5, 0.0) - 0.2).abs() < 1e-12);
        assert!((blend_scores(0.54, 0.0) - 0.216).abs() < 1e-12);
        // Outside the band the score is left alone.
        assert!((blend_scores(0.6, 0.0) - 0.48).abs() < 1e-12);
        // Any keyword overlap disables the guard.
        assert!((blend_scores(0.5, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn cosine_handles_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }
}
