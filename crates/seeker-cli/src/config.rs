//! Configuration Vault – reads/writes `~/.seeker/config.toml`.
//!
//! Every section and field is optional; a missing file means defaults.
//!
//! ```toml
//! [run]
//! goal = "red backpack"
//! steps = 20
//! seed = 42
//! backend = "mock"            # mock | ollama | fallback
//!
//! [vlm]
//! base_url = "http://localhost:11434"
//! model = "qwen2.5vl:7b"
//!
//! [perception]
//! backend = "node_oracle"     # node_oracle | node_oracle_relpose
//!
//! [[perception.oracle]]
//! node_id = 3
//! confidence = 0.9
//!
//! [[perception.relpose]]
//! goal = "red backpack"
//! node_id = 3
//! distance_m = 1.5
//! bearing_rad = 0.2
//! confidence = 0.8
//!
//! [memory]
//! sqlite_path = "/var/lib/seeker/nodes.db"
//!
//! [[memory.nodes]]
//! x = 1.0
//! y = 2.0
//! tags = ["kitchen", "red", "backpack"]
//! summary = "Kitchen counter"
//!
//! [log]
//! decision_log = "logs/decisions.jsonl"
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use seeker_runtime::{
    HypothesisBackend, OllamaConfig, OracleConfig, PerceptionBackend, RelPoseEntry,
    SearchLoopConfig, VerifierOdds,
};
use seeker_types::NodeId;

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    pub goal: String,
    pub steps: u64,
    pub seed: u64,
    pub backend: HypothesisBackend,
    pub stop_on_done: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub active_constraints: Vec<String>,
    pub retrieval_k: usize,
    pub memory_threshold: f64,
    pub hysteresis_k: u32,
}

impl Default for RunSection {
    fn default() -> Self {
        let defaults = SearchLoopConfig::default();
        Self {
            goal: defaults.goal_text,
            steps: 20,
            seed: defaults.seed,
            backend: defaults.backend,
            stop_on_done: defaults.stop_on_done,
            active_constraints: defaults.active_constraints,
            retrieval_k: defaults.retrieval_k,
            memory_threshold: defaults.memory_threshold,
            hysteresis_k: defaults.hysteresis_k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleEntry {
    pub node_id: NodeId,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelPoseRow {
    pub goal: String,
    pub node_id: NodeId,
    pub distance_m: Option<f64>,
    pub bearing_rad: Option<f64>,
    /// Kept untyped; the perception gate parses it defensively.
    pub confidence: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionSection {
    pub backend: PerceptionBackend,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub oracle: Vec<OracleEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relpose: Vec<RelPoseRow>,
}

impl PerceptionSection {
    pub fn oracle_config(&self) -> OracleConfig {
        let mut oracle = OracleConfig::new();
        for e in &self.oracle {
            oracle = oracle.with_node(e.node_id, e.confidence);
        }
        for row in &self.relpose {
            let entry = RelPoseEntry {
                distance_m: row.distance_m,
                bearing_rad: row.bearing_rad,
                confidence: row.confidence.clone(),
            };
            oracle = oracle.with_relpose(&row.goal, row.node_id, entry);
        }
        oracle
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedNode {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// Persist nodes in SQLite; in-memory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<String>,
    /// Nodes added to an empty store. The demo rooms are used when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<SeedNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_log: Option<PathBuf>,
}

/// Persisted user configuration stored in `~/.seeker/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunSection,
    pub vlm: OllamaConfig,
    pub verifier: VerifierOdds,
    pub perception: PerceptionSection,
    pub memory: MemorySection,
    pub log: LogSection,
}

impl Config {
    pub fn search_config(&self) -> SearchLoopConfig {
        SearchLoopConfig {
            goal_text: self.run.goal.clone(),
            active_constraints: self.run.active_constraints.clone(),
            seed: self.run.seed,
            retrieval_k: self.run.retrieval_k,
            memory_threshold: self.run.memory_threshold,
            hysteresis_k: self.run.hysteresis_k,
            backend: self.run.backend,
            stop_on_done: self.run.stop_on_done,
            verifier_odds: self.verifier,
            perception_backend: self.perception.backend,
            oracle: self.perception.oracle_config(),
            ollama: self.vlm.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Load / save
// ─────────────────────────────────────────────────────────────────────────────

/// Return the path to `~/.seeker/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".seeker").join("config.toml")
}

/// Load the config from `path`. Returns `None` if the file does not exist.
/// Environment overrides are applied to whatever was loaded.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `SEEKER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SEEKER_OLLAMA_URL` | `vlm.base_url` |
/// | `SEEKER_MODEL` | `vlm.model` |
/// | `SEEKER_BACKEND` | `run.backend` |
/// | `SEEKER_STEPS` | `run.steps` |
/// | `SEEKER_SEED` | `run.seed` |
/// | `VLM_BACKEND=ollama` | `run.backend = "ollama"` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("SEEKER_OLLAMA_URL") {
        cfg.vlm.base_url = v;
    }
    if let Ok(v) = std::env::var("SEEKER_MODEL") {
        cfg.vlm.model = v;
    }
    if std::env::var("VLM_BACKEND").as_deref() == Ok("ollama") {
        cfg.run.backend = HypothesisBackend::Ollama;
    }
    if let Ok(v) = std::env::var("SEEKER_BACKEND")
        && let Ok(backend) = v.parse::<HypothesisBackend>()
    {
        cfg.run.backend = backend;
    }
    if let Ok(v) = std::env::var("SEEKER_STEPS")
        && let Ok(steps) = v.parse::<u64>()
    {
        cfg.run.steps = steps;
    }
    if let Ok(v) = std::env::var("SEEKER_SEED")
        && let Ok(seed) = v.parse::<u64>()
    {
        cfg.run.seed = seed;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
