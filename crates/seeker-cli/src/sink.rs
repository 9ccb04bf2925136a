//! Decision sinks used by the binary.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use colored::Colorize;
use seeker_runtime::{DecisionSink, StepRecord};
use seeker_types::{BeliefStatus, SeekerError};

/// Appends one JSON object per line.
pub struct JsonlSink {
    out: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self, SeekerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                SeekerError::Config(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SeekerError::Config(format!("cannot open {}: {e}", path.display())))?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }
}

impl DecisionSink for JsonlSink {
    fn record(&mut self, record: &StepRecord) -> Result<(), SeekerError> {
        serde_json::to_writer(&mut self.out, record)
            .map_err(|e| SeekerError::Serialization(e.to_string()))?;
        self.out
            .write_all(b"\n")
            .and_then(|_| self.out.flush())
            .map_err(|e| SeekerError::Serialization(format!("decision log write failed: {e}")))
    }
}

/// Prints the one-line step summary, then forwards to an optional inner sink.
pub struct ConsoleSink {
    inner: Option<Box<dyn DecisionSink>>,
}

impl ConsoleSink {
    pub fn new(inner: Option<Box<dyn DecisionSink>>) -> Self {
        Self { inner }
    }
}

pub fn summary_line(record: &StepRecord) -> String {
    format!(
        "Step {}: VLM={} | Planner={} | State={}",
        record.step_id, record.meta.vlm_status, record.meta.planner_status,
        record.belief_after.target_status
    )
}

impl DecisionSink for ConsoleSink {
    fn record(&mut self, record: &StepRecord) -> Result<(), SeekerError> {
        let line = summary_line(record);
        let line = match record.belief_after.target_status {
            BeliefStatus::Done => line.green().bold(),
            BeliefStatus::Visible => line.green(),
            _ if record.belief_after.rejection_reason.is_some() => line.yellow(),
            _ => line.normal(),
        };
        println!("{line}");
        match self.inner.as_mut() {
            Some(inner) => inner.record(record),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seeker_memory::InMemoryNodeStore;
    use seeker_runtime::{HypothesisBackend, SearchLoop, SearchLoopConfig, seed_demo_store};
    use std::io::BufRead;

    async fn two_records() -> Vec<StepRecord> {
        let mut store = InMemoryNodeStore::new();
        seed_demo_store(&mut store).unwrap();
        let config = SearchLoopConfig {
            backend: HypothesisBackend::Fallback,
            ..SearchLoopConfig::default()
        };
        let mut search = SearchLoop::new(config, Box::new(store)).unwrap();
        vec![search.step().await.unwrap(), search.step().await.unwrap()]
    }

    #[tokio::test]
    async fn jsonl_sink_writes_one_line_per_record() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("logs").join("decisions.jsonl");
        let records = two_records().await;
        {
            let mut sink = JsonlSink::create(&path).expect("create");
            for r in &records {
                sink.record(r).expect("record");
            }
        }
        let file = File::open(&path).expect("open");
        let lines: Vec<String> = std::io::BufReader::new(file)
            .lines()
            .map(|l| l.expect("line"))
            .collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&lines[0]).expect("json");
        assert_eq!(first["step_id"], 0);
        assert_eq!(first["meta"]["vlm_backend"], "fallback");
        assert!(first["belief_after"]["candidate_nodes"].is_array());
    }

    #[tokio::test]
    async fn console_sink_forwards_to_inner() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("decisions.jsonl");
        let records = two_records().await;
        let inner = JsonlSink::create(&path).expect("create");
        let mut sink = ConsoleSink::new(Some(Box::new(inner)));
        sink.record(&records[0]).expect("record");
        drop(sink);
        let written = fs::read_to_string(&path).expect("read");
        assert_eq!(written.lines().count(), 1);
    }

    #[tokio::test]
    async fn summary_line_format() {
        let records = two_records().await;
        let line = summary_line(&records[0]);
        assert!(line.starts_with("Step 0: VLM=VALID | Planner="));
        assert!(line.contains("| State="));
    }
}
