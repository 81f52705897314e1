//! Export ingest agent
//!
//! Turns one exported HTML file into a persisted note bundle: raw and
//! cleaned variants, an optional extraction stub, and a journal entry.
//! `process` never propagates an error; failures become a failed result
//! with a journal record so batch runs keep going.

use crate::error::Result;
use notemill_core::{
    apply_rules, extract_text_from_html, guess_language, CleaningContext, ContentVariant,
    Extraction, IngestResult, IngestSource, IngestStatus, IngestTask, Note,
    ProcessingJournalEntry, VariantType,
};
use notemill_store::{compute_file_checksum, JournalWriter, NoteStore};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::{error, info};

pub const AGENT_ID: &str = "export_ingest:v0";

const DEFAULT_SOURCE_TYPE: &str = "evernote_html";
const STUB_SUMMARY_CHARS: usize = 280;

/// Agent that normalizes exported files into the note store.
pub struct IngestAgent {
    store: NoteStore,
    journal: JournalWriter,
    requested_outputs: BTreeSet<String>,
}

impl IngestAgent {
    pub fn new(store: NoteStore) -> Result<Self> {
        let journal = JournalWriter::new(store.journal_root())?;
        Ok(Self {
            store,
            journal,
            requested_outputs: BTreeSet::new(),
        })
    }

    /// Request an output for every task this agent processes.
    pub fn with_requested_output(mut self, output: impl Into<String>) -> Self {
        self.requested_outputs.insert(output.into());
        self
    }

    /// Process one task. All errors are folded into a failed result
    /// carrying a journal entry, never an `Err`.
    pub fn process(&self, task: &IngestTask) -> IngestResult {
        match self.process_inner(task) {
            Ok(result) => result,
            Err(err) => {
                let message = err.to_string();
                error!(task_id = %task.task_id, %message, "ingest failed");
                let entry = ProcessingJournalEntry::new(None, "ingest", AGENT_ID, "failed")
                    .with_input_ref("task_id", json!(task.task_id))
                    .with_input_ref("source_path", json!(task.payload.source_path))
                    .with_error_detail(message.clone());
                if let Err(journal_err) = self.journal.write(&entry) {
                    error!(%journal_err, "failed to journal ingest failure");
                }
                IngestResult::failed(task.task_id, entry, message)
            }
        }
    }

    fn process_inner(&self, task: &IngestTask) -> Result<IngestResult> {
        task.validate()?;
        let source_path = Path::new(&task.payload.source_path);
        let source_type = task
            .payload
            .source_type
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE_TYPE.to_string());

        let html = fs::read_to_string(source_path)?;
        let checksum = compute_file_checksum(source_path)?;
        let (text, detected_title) = extract_text_from_html(&html);
        let language = guess_language(
            &text,
            task.payload.language_hint.as_deref().unwrap_or("und"),
        );

        let context = CleaningContext::new(&source_type, &language);
        let cleaning = apply_rules(&text, &context);
        let clean_text = cleaning.text.clone();

        let mut source = IngestSource::new(&source_type, &task.payload.source_path)
            .with_language_hint(&language)
            .with_checksum(&checksum);
        if let Some(external_id) = &task.payload.external_id {
            source = source.with_external_id(external_id);
        }
        if let Some(title) = &task.payload.title {
            source = source.with_title_hint(title);
        }
        if let Some(captured_at) = task.payload.captured_at {
            source = source.with_captured_at(captured_at);
        }
        if let Some(batch_id) = &task.payload.batch_id {
            source = source.with_note("batch_id", json!(batch_id));
        }

        let title = task
            .payload
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                if detected_title.trim().is_empty() {
                    None
                } else {
                    Some(detected_title)
                }
            })
            .or_else(|| {
                source_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "Untitled".to_string());

        let file_name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut note = Note::new(source.id, title, &language)
            .with_attribute("source_filename", json!(file_name));
        if let Some(created_at) = task.payload.created_at {
            note = note.with_created_at(created_at);
        }

        let mut raw_metadata = notemill_core::entities::AttrMap::new();
        raw_metadata.insert("checksum".to_string(), json!(checksum));
        raw_metadata.insert("path".to_string(), json!(task.payload.source_path));
        let raw_variant = ContentVariant::new(note.id, VariantType::RawHtml, AGENT_ID)
            .with_content(&html)
            .with_metadata(raw_metadata);

        let mut clean_metadata = notemill_core::entities::AttrMap::new();
        clean_metadata.insert("language".to_string(), json!(language));
        clean_metadata.insert("length".to_string(), json!(clean_text.chars().count()));
        clean_metadata.extend(cleaning.to_metadata());
        let clean_variant = ContentVariant::new(note.id, VariantType::CleanText, AGENT_ID)
            .with_content(&clean_text)
            .with_diff_base(raw_variant.id)
            .with_metadata(clean_metadata);

        let mut extractions = Vec::new();
        if self.wants_output(task, "extraction_stub") {
            let stub: String = clean_text.chars().take(STUB_SUMMARY_CHARS).collect();
            extractions.push(
                Extraction::new(
                    note.id,
                    format!("{}#stub", AGENT_ID),
                    json!({
                        "summary": stub,
                        "keywords": Vec::<String>::new(),
                        "status": "pending_llm",
                    }),
                )
                .with_created_by(AGENT_ID),
            );
        }

        let variant_ids: Vec<Value> = vec![json!(raw_variant.id), json!(clean_variant.id)];
        let entry = ProcessingJournalEntry::new(Some(note.id), "ingest", AGENT_ID, "success")
            .with_input_ref("task_id", json!(task.task_id))
            .with_input_ref("source_path", json!(task.payload.source_path))
            .with_input_ref("checksum", json!(checksum))
            .with_output_ref("ingest_source", json!(source.id))
            .with_output_ref("note", json!(note.id))
            .with_output_ref("variants", Value::Array(variant_ids));

        let variants = vec![raw_variant, clean_variant];
        self.store
            .save_note_bundle(&source, &note, &variants, &extractions, &entry)?;
        self.journal.write(&entry)?;

        info!(note_id = %note.id, language = %note.language, "note ingested");
        Ok(IngestResult {
            task_id: task.task_id,
            status: IngestStatus::Success,
            ingest_source: Some(source),
            note: Some(note),
            content_variants: variants,
            extractions,
            journal_entry: Some(entry),
            error: None,
        })
    }

    fn wants_output(&self, task: &IngestTask, output: &str) -> bool {
        self.requested_outputs.contains(output)
            || task.requested_outputs.iter().any(|o| o == output)
    }
}
