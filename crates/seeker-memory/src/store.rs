//! Memory node stores.
//!
//! The decision core only consumes the three operations of [`MemoryStore`]:
//! append a node, look one up, and list all of them. Ids are assigned
//! append-only starting at 0 and nodes are never mutated or deleted.
//!
//! Two implementations are provided:
//!
//! - [`InMemoryNodeStore`] – a `BTreeMap` keyed by id; the default.
//! - [`SqliteNodeStore`] – persists nodes to a local SQLite file so a map built
//!   in one run survives into the next.
//!
//! # SQLite layout
//!
//! | column    | type    | description                                   |
//! |-----------|---------|-----------------------------------------------|
//! | node_id   | INTEGER | primary key, assigned as `MAX(node_id) + 1`   |
//! | x, y, yaw | REAL    | pose                                          |
//! | embedding | BLOB    | little-endian f32 vector, `NULL` when absent  |
//! | tags      | TEXT    | JSON array of strings                         |
//! | summary   | TEXT    | natural-language description                  |
//!
//! ```rust
//! use seeker_memory::store::{MemoryStore, SqliteNodeStore};
//! use seeker_types::Pose;
//!
//! let mut store = SqliteNodeStore::open_in_memory().unwrap();
//! let id = store
//!     .add_node(Pose::new(1.0, 2.0, 0.0), None, vec!["kitchen".into()], "Kitchen".into())
//!     .unwrap();
//! assert_eq!(id, 0);
//! assert_eq!(store.get_node(id).unwrap().unwrap().summary, "Kitchen");
//! ```

use std::collections::BTreeMap;

use rusqlite::{Connection, OptionalExtension, params};
use seeker_types::{MemoryNode, NodeId, Pose};
use thiserror::Error;
use tracing::debug;

/// Errors that can arise from memory store operations.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Tag encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Precomputed embeddings must be non-empty")]
    EmptyEmbedding,
}

/// The memory store collaborator.
pub trait MemoryStore: Send {
    /// Append a node and return its freshly assigned id.
    fn add_node(
        &mut self,
        pose: Pose,
        embedding: Option<Vec<f32>>,
        tags: Vec<String>,
        summary: String,
    ) -> Result<NodeId, MemoryError>;

    /// Look up a node; `Ok(None)` when the id was never assigned.
    fn get_node(&self, node_id: NodeId) -> Result<Option<MemoryNode>, MemoryError>;

    /// Every node, ordered by ascending id.
    fn all_nodes(&self) -> Result<Vec<MemoryNode>, MemoryError>;
}

fn check_embedding(embedding: &Option<Vec<f32>>) -> Result<(), MemoryError> {
    match embedding {
        Some(v) if v.is_empty() => Err(MemoryError::EmptyEmbedding),
        _ => Ok(()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// InMemoryNodeStore
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryNodeStore {
    nodes: BTreeMap<NodeId, MemoryNode>,
    next_id: NodeId,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl MemoryStore for InMemoryNodeStore {
    fn add_node(
        &mut self,
        pose: Pose,
        embedding: Option<Vec<f32>>,
        tags: Vec<String>,
        summary: String,
    ) -> Result<NodeId, MemoryError> {
        check_embedding(&embedding)?;
        let node_id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            node_id,
            MemoryNode {
                node_id,
                pose,
                embedding,
                tags,
                summary,
            },
        );
        Ok(node_id)
    }

    fn get_node(&self, node_id: NodeId) -> Result<Option<MemoryNode>, MemoryError> {
        Ok(self.nodes.get(&node_id).cloned())
    }

    fn all_nodes(&self) -> Result<Vec<MemoryNode>, MemoryError> {
        Ok(self.nodes.values().cloned().collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding serialisation helpers
// ─────────────────────────────────────────────────────────────────────────────

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// SqliteNodeStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed append-only node store.
pub struct SqliteNodeStore {
    conn: Connection,
}

impl SqliteNodeStore {
    /// Open (or create) a persistent database at `path`.
    pub fn open(path: &str) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a temporary in-memory database.
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), MemoryError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS memory_nodes (
                node_id   INTEGER NOT NULL PRIMARY KEY,
                x         REAL NOT NULL,
                y         REAL NOT NULL,
                yaw       REAL NOT NULL,
                embedding BLOB,
                tags      TEXT NOT NULL,
                summary   TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<(MemoryNode, String)> {
        let node_id: i64 = row.get(0)?;
        let blob: Option<Vec<u8>> = row.get(4)?;
        let tags_json: String = row.get(5)?;
        let node = MemoryNode {
            node_id: node_id as NodeId,
            pose: Pose::new(row.get(1)?, row.get(2)?, row.get(3)?),
            embedding: blob.map(|b| bytes_to_embedding(&b)),
            tags: Vec::new(),
            summary: row.get(6)?,
        };
        Ok((node, tags_json))
    }

    fn decode_tags((mut node, tags_json): (MemoryNode, String)) -> Result<MemoryNode, MemoryError> {
        node.tags = serde_json::from_str(&tags_json)?;
        Ok(node)
    }
}

impl MemoryStore for SqliteNodeStore {
    fn add_node(
        &mut self,
        pose: Pose,
        embedding: Option<Vec<f32>>,
        tags: Vec<String>,
        summary: String,
    ) -> Result<NodeId, MemoryError> {
        check_embedding(&embedding)?;
        let tags_json = serde_json::to_string(&tags)?;
        let blob = embedding.as_deref().map(embedding_to_bytes);
        let tx = self.conn.transaction()?;
        let node_id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(node_id) + 1, 0) FROM memory_nodes",
            [],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO memory_nodes (node_id, x, y, yaw, embedding, tags, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![node_id, pose.x, pose.y, pose.yaw, blob, tags_json, summary],
        )?;
        tx.commit()?;
        debug!(node_id, "memory node persisted");
        Ok(node_id as NodeId)
    }

    fn get_node(&self, node_id: NodeId) -> Result<Option<MemoryNode>, MemoryError> {
        let row = self
            .conn
            .query_row(
                "SELECT node_id, x, y, yaw, embedding, tags, summary
                 FROM memory_nodes WHERE node_id = ?1",
                params![node_id as i64],
                Self::row_to_node,
            )
            .optional()?;
        row.map(Self::decode_tags).transpose()
    }

    fn all_nodes(&self) -> Result<Vec<MemoryNode>, MemoryError> {
        let mut stmt = self.conn.prepare(
            "SELECT node_id, x, y, yaw, embedding, tags, summary
             FROM memory_nodes
             ORDER BY node_id ASC",
        )?;
        let rows = stmt.query_map([], Self::row_to_node)?;
        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(Self::decode_tags(row?)?);
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(store: &mut dyn MemoryStore, tags: &[&str], summary: &str) -> NodeId {
        store
            .add_node(
                Pose::new(0.0, 0.0, 0.0),
                None,
                tags.iter().map(|t| t.to_string()).collect(),
                summary.to_string(),
            )
            .unwrap()
    }

    #[test]
    fn in_memory_ids_are_sequential() {
        let mut store = InMemoryNodeStore::new();
        assert_eq!(add(&mut store, &["kitchen"], "Kitchen"), 0);
        assert_eq!(add(&mut store, &["hallway"], "Hallway"), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_node(1).unwrap().unwrap().tags, vec!["hallway"]);
        assert!(store.get_node(7).unwrap().is_none());
    }

    #[test]
    fn in_memory_all_nodes_ordered_by_id() {
        let mut store = InMemoryNodeStore::new();
        for i in 0..5 {
            add(&mut store, &[], &format!("node {i}"));
        }
        let ids: Vec<NodeId> = store.all_nodes().unwrap().iter().map(|n| n.node_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn empty_embedding_is_rejected() {
        let mut store = InMemoryNodeStore::new();
        let err = store
            .add_node(Pose::new(0.0, 0.0, 0.0), Some(vec![]), vec![], String::new())
            .unwrap_err();
        assert!(matches!(err, MemoryError::EmptyEmbedding));
        assert!(store.is_empty());
    }

    #[test]
    fn sqlite_preserves_node_fields() {
        let mut store = SqliteNodeStore::open_in_memory().unwrap();
        let id = store
            .add_node(
                Pose::new(8.0, 5.0, -1.57),
                Some(vec![0.25, -0.5, 1.0]),
                vec!["bedroom".into(), "closet".into()],
                "Bedroom with bed and closet".into(),
            )
            .unwrap();
        let node = store.get_node(id).unwrap().unwrap();
        assert_eq!(node.pose, Pose::new(8.0, 5.0, -1.57));
        assert_eq!(node.embedding, Some(vec![0.25, -0.5, 1.0]));
        assert_eq!(node.tags, vec!["bedroom", "closet"]);
        assert!(store.get_node(id + 1).unwrap().is_none());
    }

    #[test]
    fn sqlite_ids_continue_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.db");
        let path = path.to_str().unwrap();
        {
            let mut store = SqliteNodeStore::open(path).unwrap();
            add(&mut store, &["kitchen"], "Kitchen");
            add(&mut store, &["hallway"], "Hallway");
        }
        let mut store = SqliteNodeStore::open(path).unwrap();
        assert_eq!(add(&mut store, &["bathroom"], "Bathroom"), 2);
        let nodes = store.all_nodes().unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].summary, "Kitchen");
        assert_eq!(nodes[0].embedding, None);
    }
}
