//! `seeker` – run the belief-state search loop from the command line.
//!
//! 1. Loads `~/.seeker/config.toml` (or `--config`), applies `SEEKER_*`
//!    environment overrides, then command-line flags.
//! 2. Opens the memory store (SQLite when `[memory].sqlite_path` is set) and
//!    seeds it when empty.
//! 3. Runs the loop, printing one summary line per step and appending every
//!    decision record to the JSONL log when one is configured.
//! 4. Ctrl-C stops the run after the current step.
//!
//! Exits non-zero on a fatal run error.

mod config;
mod sink;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::Colorize;
use seeker_memory::{InMemoryNodeStore, MemoryStore, SqliteNodeStore};
use seeker_runtime::{DecisionSink, HypothesisBackend, SearchLoop, init_tracing, seed_demo_store};
use seeker_types::{Pose, SeekerError};
use tracing::{info, warn};

use crate::config::Config;
use crate::sink::{ConsoleSink, JsonlSink};

/// Belief-state search for a described target.
#[derive(Debug, Parser)]
#[command(name = "seeker", version, about)]
struct Cli {
    /// Number of steps to run.
    #[arg(long)]
    steps: Option<u64>,

    /// Seed of the run's random stream.
    #[arg(long)]
    seed: Option<u64>,

    /// Hypothesis backend: mock, ollama or fallback.
    #[arg(long)]
    backend: Option<HypothesisBackend>,

    /// Configuration file (default `~/.seeker/config.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target description.
    #[arg(long)]
    goal: Option<String>,

    /// Stop as soon as the target is reached.
    #[arg(long)]
    stop_on_done: bool,

    /// Append decision records to this JSONL file.
    #[arg(long)]
    decision_log: Option<PathBuf>,

    /// Write the default configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing("seeker");

    let path = cli.config.clone().unwrap_or_else(config::config_path);

    if cli.init_config {
        if path.exists() {
            println!("  Config already exists at {}", path.display().to_string().bold());
            return ExitCode::SUCCESS;
        }
        return match config::save_to(&Config::default(), &path) {
            Ok(()) => {
                println!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", "Error saving config".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        Ok(None) => {
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    let cfg = apply_flags(cfg, &cli);

    // ── Ctrl-C: finish the current step, then stop ─────────────────────────
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("{}", "Ctrl-C received, stopping after this step".yellow().bold());
        cancel_handler.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    // The runtime is built after `init_tracing`; see telemetry.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start runtime".red(), e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cfg, &cancel)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {}", "Run aborted".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn apply_flags(mut cfg: Config, cli: &Cli) -> Config {
    if let Some(steps) = cli.steps {
        cfg.run.steps = steps;
    }
    if let Some(seed) = cli.seed {
        cfg.run.seed = seed;
    }
    if let Some(backend) = cli.backend {
        cfg.run.backend = backend;
    }
    if let Some(goal) = &cli.goal {
        cfg.run.goal = goal.clone();
    }
    if cli.stop_on_done {
        cfg.run.stop_on_done = true;
    }
    if let Some(log) = &cli.decision_log {
        cfg.log.decision_log = Some(log.clone());
    }
    cfg
}

async fn run(cfg: &Config, cancel: &AtomicBool) -> Result<(), SeekerError> {
    let store = open_store(cfg)?;
    let mut search = SearchLoop::new(cfg.search_config(), store)?;

    let inner: Option<Box<dyn DecisionSink>> = match &cfg.log.decision_log {
        Some(path) => Some(Box::new(JsonlSink::create(path)?)),
        None => None,
    };
    let mut sink = ConsoleSink::new(inner);

    println!(
        "  {} goal={} backend={} seed={} run={}",
        "seeker".bold().cyan(),
        cfg.run.goal.bold(),
        cfg.run.backend,
        cfg.run.seed,
        search.run_id().to_string().dimmed()
    );

    let summary = search.run(cfg.run.steps, &mut sink, cancel).await?;
    let status = summary.final_status.to_string();
    println!(
        "  {} {} step(s), final status {}{}",
        "✓".green().bold(),
        summary.steps_run,
        status.bold(),
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    Ok(())
}

fn open_store(cfg: &Config) -> Result<Box<dyn MemoryStore>, SeekerError> {
    let memory = |e: seeker_memory::MemoryError| SeekerError::Memory(e.to_string());
    let mut store: Box<dyn MemoryStore> = match &cfg.memory.sqlite_path {
        Some(path) => Box::new(SqliteNodeStore::open(path).map_err(memory)?),
        None => Box::new(InMemoryNodeStore::new()),
    };

    if store.all_nodes().map_err(memory)?.is_empty() {
        if cfg.memory.nodes.is_empty() {
            let ids = seed_demo_store(store.as_mut()).map_err(memory)?;
            info!(nodes = ids.len(), "seeded demo map");
        } else {
            for n in &cfg.memory.nodes {
                store
                    .add_node(Pose::new(n.x, n.y, n.yaw), None, n.tags.clone(), n.summary.clone())
                    .map_err(memory)?;
            }
            info!(nodes = cfg.memory.nodes.len(), "seeded configured nodes");
        }
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("seeker").chain(args.iter().copied())).expect("parse")
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "--steps", "5", "--seed", "9", "--backend", "fallback", "--goal", "blue mug",
            "--stop-on-done", "--decision-log", "out.jsonl",
        ]);
        let cfg = apply_flags(Config::default(), &cli);
        assert_eq!(cfg.run.steps, 5);
        assert_eq!(cfg.run.seed, 9);
        assert_eq!(cfg.run.backend, HypothesisBackend::Fallback);
        assert_eq!(cfg.run.goal, "blue mug");
        assert!(cfg.run.stop_on_done);
        assert_eq!(cfg.log.decision_log, Some(PathBuf::from("out.jsonl")));
    }

    #[test]
    fn absent_flags_keep_config() {
        let cfg = apply_flags(Config::default(), &parse(&[]));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn bad_backend_is_rejected() {
        let args = ["seeker", "--backend", "gpt"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn empty_store_gets_demo_rooms() {
        let store = open_store(&Config::default()).expect("store");
        assert_eq!(store.all_nodes().expect("nodes").len(), 5);
    }

    #[test]
    fn sqlite_store_is_seeded_once() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let mut cfg = Config::default();
        cfg.memory.sqlite_path = Some(dir.path().join("nodes.db").to_string_lossy().into_owned());
        cfg.memory.nodes = vec![config::SeedNode {
            x: 0.0,
            y: 0.0,
            yaw: 0.0,
            tags: vec!["garage".into()],
            summary: "Garage".into(),
        }];
        drop(open_store(&cfg).expect("first open"));
        let store = open_store(&cfg).expect("second open");
        assert_eq!(store.all_nodes().expect("nodes").len(), 1);
    }
}
