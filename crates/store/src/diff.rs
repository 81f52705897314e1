//! Diff reports across a note's ingest stages
//!
//! Compares raw HTML, cleaned text, and the latest enrichment summary
//! for one note. The report carries capped excerpts plus the line sets
//! each stage transition removed and added.

use crate::error::Result;
use crate::note_store::{NoteBundle, NoteStore};
use notemill_core::entities::{Note, VariantType};
use serde::Serialize;
use std::collections::BTreeSet;

const EXCERPT_CHARS: usize = 400;
const ENHANCE_PREFIX: &str = "llm_enhance:v0";

/// Lines one stage transition dropped and introduced.
#[derive(Debug, Clone, Serialize)]
pub struct DiffStats {
    pub lines_removed: Vec<String>,
    pub lines_added: Vec<String>,
}

impl DiffStats {
    fn between(before: &str, after: &str) -> Self {
        let before_lines: BTreeSet<&str> = non_empty_lines(before).collect();
        let after_lines: BTreeSet<&str> = non_empty_lines(after).collect();
        Self {
            lines_removed: before_lines
                .difference(&after_lines)
                .map(|l| l.to_string())
                .collect(),
            lines_added: after_lines
                .difference(&before_lines)
                .map(|l| l.to_string())
                .collect(),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        self.lines_removed.is_empty() && self.lines_added.is_empty()
    }
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Diff report for one note across its pipeline stages.
#[derive(Debug, Clone, Serialize)]
pub struct VersionDiff {
    pub note: Note,
    pub raw_excerpt: String,
    pub clean_excerpt: String,
    pub summary_excerpt: String,
    pub raw_to_clean: DiffStats,
    pub clean_to_summary: DiffStats,
}

/// Builds diff reports between raw HTML, cleaned text, and LLM outputs.
pub struct VersionDiffer {
    store: NoteStore,
}

impl VersionDiffer {
    pub fn new(store: NoteStore) -> Self {
        Self { store }
    }

    pub fn diff_note(&self, note_id: &str) -> Result<VersionDiff> {
        let bundle = self.store.load_note_bundle(note_id)?;
        let raw = bundle
            .latest_content(VariantType::RawHtml)
            .unwrap_or_default();
        let clean = bundle
            .latest_content(VariantType::CleanText)
            .unwrap_or_default();
        let summary = latest_summary(&bundle);

        Ok(VersionDiff {
            note: bundle.note().clone(),
            raw_excerpt: excerpt(&raw),
            clean_excerpt: excerpt(&clean),
            summary_excerpt: excerpt(&summary),
            raw_to_clean: DiffStats::between(&raw, &clean),
            clean_to_summary: DiffStats::between(&clean, &summary),
        })
    }

    /// Diff many notes, skipping ones that fail to load.
    pub fn report(&self, note_ids: impl IntoIterator<Item = String>) -> Vec<VersionDiff> {
        note_ids
            .into_iter()
            .filter_map(|id| self.diff_note(&id).ok())
            .collect()
    }
}

fn latest_summary(bundle: &NoteBundle) -> String {
    let extraction = bundle
        .latest_extraction(ENHANCE_PREFIX)
        .or_else(|| bundle.last_extraction());
    let Some(extraction) = extraction else {
        return String::new();
    };
    match extraction.payload.get("summary") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notemill_core::entities::{
        ContentVariant, Extraction, IngestSource, Note, ProcessingJournalEntry,
    };
    use serde_json::json;

    #[test]
    fn test_diff_reports_stage_changes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");

        let source = IngestSource::new("evernote_html", "/exports/a.html");
        let note = Note::new(source.id, "Sample", "en");
        let raw = ContentVariant::new(note.id, VariantType::RawHtml, "test")
            .with_content("<p>keep</p>\n<p>drop me</p>");
        let clean =
            ContentVariant::new(note.id, VariantType::CleanText, "test").with_content("keep");
        let journal = ProcessingJournalEntry::new(Some(note.id), "ingest", "test", "success");
        store
            .save_note_bundle(&source, &note, &[raw, clean], &[], &journal)
            .expect("save");

        let extraction = Extraction::new(
            note.id,
            "llm_enhance:v0#model",
            json!({"summary": "short recap"}),
        );
        store
            .append_extraction(&note.id.to_string(), &extraction, None)
            .expect("append");

        let differ = VersionDiffer::new(store);
        let diff = differ.diff_note(&note.id.to_string()).expect("diff");

        assert!(diff
            .raw_to_clean
            .lines_removed
            .iter()
            .any(|l| l.contains("drop me")));
        assert_eq!(diff.summary_excerpt, "short recap");
        assert!(diff
            .clean_to_summary
            .lines_added
            .contains(&"short recap".to_string()));
    }

    #[test]
    fn test_report_skips_missing_notes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        let differ = VersionDiffer::new(store);
        let diffs = differ.report(vec!["no-such-note".to_string()]);
        assert!(diffs.is_empty());
    }
}
