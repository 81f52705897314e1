//! Batch ingest over an export directory
//!
//! Walks a directory tree for exported HTML files, runs each through
//! the ingest agent, and appends one JSON line per file to a progress
//! log. A failing file is counted and skipped, never fatal to the run.

use crate::error::Result;
use crate::ingest::{IngestAgent, AGENT_ID};
use chrono::Utc;
use notemill_core::{IngestStatus, IngestTask, TaskPayload};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

const PROGRESS_FILE: &str = "batch_progress.jsonl";

/// Tallies for one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Serialize)]
struct ProgressLine<'a> {
    at: chrono::DateTime<Utc>,
    batch_id: &'a str,
    source_path: &'a str,
    status: &'a str,
    note_id: Option<Uuid>,
    error: Option<&'a str>,
}

/// Runs the ingest agent across every export file under a directory.
pub struct BatchIngestor {
    agent: IngestAgent,
    progress_path: PathBuf,
}

impl BatchIngestor {
    pub fn new(agent: IngestAgent, journal_root: impl Into<PathBuf>) -> Result<Self> {
        let root = journal_root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            agent,
            progress_path: root.join(PROGRESS_FILE),
        })
    }

    /// Collect `.html` / `.htm` files under `input_dir`, sorted by path
    /// for deterministic ordering.
    pub fn collect_files(input_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(input_dir) {
            let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            let is_export = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
                .unwrap_or(false);
            if is_export {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Ingest up to `limit` files under `input_dir` (0 = all).
    pub fn run(&self, input_dir: &Path, limit: usize) -> Result<BatchSummary> {
        let batch_id = Uuid::new_v4().to_string();
        let mut files = Self::collect_files(input_dir)?;
        if limit > 0 {
            files.truncate(limit);
        }
        info!(%batch_id, files = files.len(), "batch ingest starting");

        let mut summary = BatchSummary {
            batch_id: batch_id.clone(),
            total: files.len(),
            ..BatchSummary::default()
        };
        for path in &files {
            let mut payload = TaskPayload::for_path(path.to_string_lossy());
            payload.batch_id = Some(batch_id.clone());
            let task = IngestTask::new(AGENT_ID, payload);
            let result = self.agent.process(&task);

            let (status, note_id, error) = match result.status {
                IngestStatus::Success => {
                    summary.succeeded += 1;
                    ("success", result.note.as_ref().map(|n| n.id), None)
                }
                _ => {
                    summary.failed += 1;
                    warn!(path = %path.display(), "file failed during batch ingest");
                    (
                        "failed",
                        None,
                        result.error.as_ref().map(|e| e.message.as_str()),
                    )
                }
            };
            self.append_progress(&ProgressLine {
                at: Utc::now(),
                batch_id: &batch_id,
                source_path: &path.to_string_lossy(),
                status,
                note_id,
                error,
            });
        }

        info!(
            %batch_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "batch ingest finished"
        );
        Ok(summary)
    }

    fn append_progress(&self, line: &ProgressLine<'_>) {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.progress_path)
            .and_then(|mut file| {
                let json = serde_json::to_string(line).unwrap_or_default();
                writeln!(file, "{}", json)
            });
        if let Err(err) = result {
            warn!(%err, "failed to append batch progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notemill_store::NoteStore;
    use std::fs;

    #[test]
    fn test_batch_continues_past_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exports = dir.path().join("exports");
        fs::create_dir_all(exports.join("nested")).expect("mkdir");
        fs::write(
            exports.join("a.html"),
            "<html><body><p>first note body</p></body></html>",
        )
        .expect("write");
        fs::write(
            exports.join("nested/b.htm"),
            "<html><body><p>second note body</p></body></html>",
        )
        .expect("write");
        // Invalid UTF-8 makes this file unreadable as text.
        fs::write(exports.join("c.html"), [0xff, 0xfe, 0x00]).expect("write");
        fs::write(exports.join("ignored.txt"), "not an export").expect("write");

        let store = NoteStore::new(dir.path().join("data")).expect("store");
        let journal_root = store.journal_root();
        let agent = IngestAgent::new(store).expect("agent");
        let batch = BatchIngestor::new(agent, &journal_root).expect("batch");

        let summary = batch.run(&exports, 0).expect("run");
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let progress =
            fs::read_to_string(journal_root.join("batch_progress.jsonl")).expect("progress");
        assert_eq!(progress.lines().count(), 3);
    }

    #[test]
    fn test_limit_caps_the_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exports = dir.path().join("exports");
        fs::create_dir_all(&exports).expect("mkdir");
        for name in ["a.html", "b.html", "c.html"] {
            fs::write(exports.join(name), "<p>note body</p>").expect("write");
        }

        let store = NoteStore::new(dir.path().join("data")).expect("store");
        let journal_root = store.journal_root();
        let agent = IngestAgent::new(store).expect("agent");
        let batch = BatchIngestor::new(agent, &journal_root).expect("batch");

        let summary = batch.run(&exports, 2).expect("run");
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);

        let progress =
            fs::read_to_string(journal_root.join("batch_progress.jsonl")).expect("progress");
        assert_eq!(progress.lines().count(), 2);
    }

    #[test]
    fn test_collect_files_is_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("z.html"), "<p>z</p>").expect("write");
        fs::write(dir.path().join("a.html"), "<p>a</p>").expect("write");

        let files = BatchIngestor::collect_files(dir.path()).expect("collect");
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["a.html", "z.html"]);
    }
}
