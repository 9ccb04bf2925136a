//! Prompt construction for the external model.
//!
//! The context handed to the model is plain data: goal, constraints, the
//! belief status (for reference only, the model's `target_status` is a
//! different enumeration) and up to [`MEMORY_CONTEXT_LIMIT`] memory
//! candidates with truncated summaries.

use seeker_memory::{MemoryError, MemoryStore};
use seeker_types::{BeliefStatus, Candidate, NodeId};
use serde::{Deserialize, Serialize};

/// Number of retrieval candidates shown to the model.
pub const MEMORY_CONTEXT_LIMIT: usize = 3;
/// Summaries longer than this many characters are cut.
pub const SUMMARY_MAX_CHARS: usize = 50;

const MISSING: &str = "<missing>";

const SCHEMA_SECTION: &str = r#"Conditional requirements:
- If action="goto_node": must include navigation_goal with type="node_id" and node_id (integer)
- If action="approach": must include navigation_goal with type="pose_relative", distance_meters, angle_degrees, standoff_distance
- If action="ask_clarification": must include clarification_question (string, max 160 chars)"#;

/// Re-prompt sent after an unusable answer.
pub const REPAIR_PROMPT: &str = r#"You returned invalid JSON. Output ONLY valid JSON with no extra text.

Required schema:
- target_status: one of ["visible", "not_visible", "ambiguous"]
- action: one of ["approach", "explore", "rotate", "goto_node", "ask_clarification", "stop"]
- confidence: number in [0.0, 1.0]
- rationale: string (max 240 chars)

Conditional requirements:
- If action="goto_node": must include navigation_goal with type="node_id" and node_id (integer)
- If action="approach": must include navigation_goal with type="pose_relative", distance_meters, angle_degrees, standoff_distance
- If action="ask_clarification": must include clarification_question (string, max 160 chars)

Output valid JSON now:"#;

/// One memory candidate as the model sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryContextEntry {
    pub node_id: NodeId,
    pub score: f64,
    pub tags: Vec<String>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptContext {
    pub goal_text: String,
    pub active_constraints: Vec<String>,
    pub belief_status: BeliefStatus,
    pub memory_context: Vec<MemoryContextEntry>,
}

/// Resolve the top candidates against the store.
///
/// Candidates whose node is gone get a `<missing>` placeholder so the prompt
/// stays aligned with the candidate list; their ids are returned separately.
pub fn build_memory_context(
    candidates: &[Candidate],
    store: &dyn MemoryStore,
) -> Result<(Vec<MemoryContextEntry>, Vec<NodeId>), MemoryError> {
    let mut entries = Vec::new();
    let mut missing = Vec::new();
    for c in candidates.iter().take(MEMORY_CONTEXT_LIMIT) {
        match store.get_node(c.node_id)? {
            Some(node) => entries.push(MemoryContextEntry {
                node_id: node.node_id,
                score: c.score,
                tags: node.tags,
                summary: node.summary.chars().take(SUMMARY_MAX_CHARS).collect(),
            }),
            None => {
                entries.push(MemoryContextEntry {
                    node_id: c.node_id,
                    score: c.score,
                    tags: vec![MISSING.to_string()],
                    summary: MISSING.to_string(),
                });
                missing.push(c.node_id);
            }
        }
    }
    Ok((entries, missing))
}

/// First-attempt prompt.
pub fn build_prompt(ctx: &PromptContext) -> String {
    let constraints = if ctx.active_constraints.is_empty() {
        "none".to_string()
    } else {
        ctx.active_constraints.join(", ")
    };

    let mut memory = String::new();
    for entry in &ctx.memory_context {
        let tags = if entry.tags.is_empty() {
            "none".to_string()
        } else {
            entry.tags.join(", ")
        };
        memory.push_str(&format!(
            "  - node_id={}, score={:.2}, tags=[{}], summary=\"{}\"\n",
            entry.node_id, entry.score, tags, entry.summary
        ));
    }
    if memory.is_empty() {
        memory.push_str("  (no memory nodes available)\n");
    }

    format!(
        r#"You are a navigation assistant. Output ONLY valid JSON, no other text.

Required schema:
- target_status: one of ["visible", "not_visible", "ambiguous"] (OUTPUT field - different from belief status)
- action: one of ["approach", "explore", "rotate", "goto_node", "ask_clarification", "stop"]
- confidence: number in [0.0, 1.0]
- rationale: string (max 240 chars)

{SCHEMA_SECTION}

Current context:
- Goal: {goal}
- Constraints: {constraints}
- Belief status: {status} (for reference only - OUTPUT target_status must be ONLY one of ["visible","not_visible","ambiguous"])
- Candidate memory nodes (top 3):
{memory}
Output your hypothesis as JSON:"#,
        goal = ctx.goal_text,
        status = ctx.belief_status,
    )
}
