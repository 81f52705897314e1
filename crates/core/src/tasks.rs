//! Task and result types shared by the ingest agents

use crate::entities::{ContentVariant, Extraction, IngestSource, Note, ProcessingJournalEntry};
use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome tag for one ingest attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Success,
    Failed,
    Skipped,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Typed input descriptor for one ingest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPayload {
    pub source_path: String,
    pub source_type: Option<String>,
    pub title: Option<String>,
    pub language_hint: Option<String>,
    pub external_id: Option<String>,
    pub batch_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl TaskPayload {
    pub fn for_path(source_path: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            ..Self::default()
        }
    }
}

/// One unit of ingest work handed to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestTask {
    pub task_id: Uuid,
    pub agent: String,
    pub payload: TaskPayload,
    #[serde(default)]
    pub requested_outputs: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl IngestTask {
    pub fn new(agent: impl Into<String>, payload: TaskPayload) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            agent: agent.into(),
            payload,
            requested_outputs: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_requested_output(mut self, output: impl Into<String>) -> Self {
        self.requested_outputs.push(output.into());
        self
    }

    /// A task is only processable with a source path to read from.
    pub fn validate(&self) -> Result<()> {
        if self.payload.source_path.trim().is_empty() {
            return Err(CoreError::InvalidTask("source_path is empty".to_string()));
        }
        Ok(())
    }
}

/// Structured error carried by a failed ingest result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestError {
    pub message: String,
}

/// Everything one ingest attempt produced, success or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub task_id: Uuid,
    pub status: IngestStatus,
    pub ingest_source: Option<IngestSource>,
    pub note: Option<Note>,
    #[serde(default)]
    pub content_variants: Vec<ContentVariant>,
    #[serde(default)]
    pub extractions: Vec<Extraction>,
    pub journal_entry: Option<ProcessingJournalEntry>,
    pub error: Option<IngestError>,
}

impl IngestResult {
    pub fn failed(task_id: Uuid, journal_entry: ProcessingJournalEntry, message: String) -> Self {
        Self {
            task_id,
            status: IngestStatus::Failed,
            ingest_source: None,
            note: None,
            content_variants: Vec::new(),
            extractions: Vec::new(),
            journal_entry: Some(journal_entry),
            error: Some(IngestError { message }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = IngestTask::new("export_ingest:v0", TaskPayload::for_path("/tmp/a.html"))
            .with_requested_output("extraction_stub");

        assert_eq!(task.agent, "export_ingest:v0");
        assert_eq!(task.payload.source_path, "/tmp/a.html");
        assert_eq!(task.requested_outputs, vec!["extraction_stub"]);
    }

    #[test]
    fn test_validate_rejects_blank_source_path() {
        let task = IngestTask::new("export_ingest:v0", TaskPayload::for_path("  "));
        assert!(task.validate().is_err());

        let task = IngestTask::new("export_ingest:v0", TaskPayload::for_path("/tmp/a.html"));
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_status_tags() {
        assert_eq!(IngestStatus::Success.as_str(), "success");
        assert_eq!(IngestStatus::Failed.as_str(), "failed");
        assert_eq!(IngestStatus::Skipped.as_str(), "skipped");
    }
}
