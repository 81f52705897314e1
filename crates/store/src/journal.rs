//! Append-only processing journal with a rolling metrics fold
//!
//! Every pipeline step attempt is appended as one JSON line to
//! `processing_journal.jsonl`; `processing_metrics.json` is a pure fold
//! over those entries (counts by stage and status). The fold is a
//! read-modify-write, not atomic; concurrent writers can lose updates,
//! which is an accepted operational constraint.

use crate::Result;
use chrono::{DateTime, Utc};
use notemill_core::entities::ProcessingJournalEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

const JOURNAL_FILE: &str = "processing_journal.jsonl";
const METRICS_FILE: &str = "processing_metrics.json";

/// Rolling aggregate over the journal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JournalMetrics {
    pub total_entries: u64,
    #[serde(default)]
    pub by_stage: BTreeMap<String, u64>,
    #[serde(default)]
    pub by_status: BTreeMap<String, u64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Writer for the processing journal.
#[derive(Debug, Clone)]
pub struct JournalWriter {
    journal_root: PathBuf,
}

impl JournalWriter {
    pub fn new(journal_root: impl Into<PathBuf>) -> Result<Self> {
        let journal_root = journal_root.into();
        fs::create_dir_all(&journal_root)?;
        Ok(Self { journal_root })
    }

    pub fn journal_path(&self) -> PathBuf {
        self.journal_root.join(JOURNAL_FILE)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.journal_root.join(METRICS_FILE)
    }

    /// Append one entry and refresh the metrics fold.
    pub fn write(&self, entry: &ProcessingJournalEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.journal_path())?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{}", line)?;

        let mut metrics = self.read_metrics()?;
        metrics.total_entries += 1;
        *metrics.by_stage.entry(entry.stage.clone()).or_default() += 1;
        *metrics.by_status.entry(entry.status.clone()).or_default() += 1;
        metrics.last_updated = Some(Utc::now());
        fs::write(self.metrics_path(), serde_json::to_string_pretty(&metrics)?)?;
        debug!(stage = %entry.stage, status = %entry.status, "journal entry written");
        Ok(())
    }

    /// Current metrics, empty when nothing has been journaled yet.
    pub fn read_metrics(&self) -> Result<JournalMetrics> {
        let path = self.metrics_path();
        if !path.exists() {
            return Ok(JournalMetrics::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// All entries, in append order.
    pub fn read_entries(&self) -> Result<Vec<ProcessingJournalEntry>> {
        let path = self.journal_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(path)?;
        let mut entries = Vec::new();
        for line in raw.lines().filter(|l| !l.trim().is_empty()) {
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }
}
