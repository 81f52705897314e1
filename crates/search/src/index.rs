//! Inverted index over note clean text and enrichment output
//!
//! Each note contributes tokens from three fields with fixed weights:
//! clean text at 1.0, the latest summary at 1.5, and keywords at 2.0.
//! Posting scores are the weighted term counts scaled by
//! `ln(1 + N / (1 + df))` and stored sorted by score descending.

use crate::error::Result;
use crate::tokenize::tokenize;
use chrono::{DateTime, Utc};
use notemill_core::entities::VariantType;
use notemill_store::{NoteBundle, NoteStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const INDEX_FILE: &str = "inverted_index.json";
const ENHANCE_PREFIX: &str = "llm_enhance:v0";

const WEIGHT_CLEAN: f64 = 1.0;
const WEIGHT_SUMMARY: f64 = 1.5;
const WEIGHT_KEYWORDS: f64 = 2.0;

/// Per-note display metadata kept alongside the postings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument {
    pub title: String,
    pub language: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    pub note_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub note_count: usize,
    pub token_count: f64,
}

/// The on-disk index document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchIndex {
    pub built_at: DateTime<Utc>,
    pub documents: BTreeMap<String, IndexDocument>,
    pub postings: BTreeMap<String, Vec<Posting>>,
    pub stats: IndexStats,
}

#[derive(Debug, Clone)]
pub struct IndexBuildResult {
    pub output_path: PathBuf,
    pub note_count: usize,
    pub token_count: f64,
}

/// Builds the inverted index from every note in the store.
pub struct IndexBuilder {
    store: NoteStore,
    output_dir: PathBuf,
}

impl IndexBuilder {
    pub fn new(store: NoteStore, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            output_dir: output_dir.into(),
        }
    }

    /// Build and persist the index. `limit` of zero indexes everything.
    pub fn build(&self, limit: usize) -> Result<IndexBuildResult> {
        fs::create_dir_all(&self.output_dir)?;

        let mut documents = BTreeMap::new();
        let mut raw_postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut document_freq: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_tokens = 0.0;

        let note_ids: Vec<String> = self.store.list_note_ids()?.collect();
        let note_ids = if limit > 0 && note_ids.len() > limit {
            note_ids[..limit].to_vec()
        } else {
            note_ids
        };

        for note_id in &note_ids {
            let bundle = match self.store.load_note_bundle(note_id) {
                Ok(bundle) => bundle,
                Err(err) => {
                    warn!(note_id, %err, "skipping unloadable note");
                    continue;
                }
            };
            let clean_text = bundle
                .latest_content(VariantType::CleanText)
                .unwrap_or_default();
            let (summary, keywords) = latest_summary(&bundle);

            let mut merged: BTreeMap<String, f64> = BTreeMap::new();
            accumulate(&mut merged, tokenize(&clean_text), WEIGHT_CLEAN);
            accumulate(&mut merged, tokenize(&summary), WEIGHT_SUMMARY);
            let keyword_tokens: Vec<String> =
                keywords.iter().map(|k| k.to_lowercase()).collect();
            accumulate(&mut merged, keyword_tokens, WEIGHT_KEYWORDS);

            total_tokens += merged.values().sum::<f64>();
            for (token, score) in merged {
                raw_postings.entry(token.clone()).or_default().push(Posting {
                    note_id: note_id.clone(),
                    score,
                });
                *document_freq.entry(token).or_default() += 1;
            }

            let note = bundle.note();
            documents.insert(
                note_id.clone(),
                IndexDocument {
                    title: note.canonical_title.clone(),
                    language: note.language.clone(),
                    keywords,
                    summary,
                    created_at: note.ingested_at,
                },
            );
        }

        let note_count = documents.len();
        let postings = normalize_postings(raw_postings, &document_freq, note_count);
        let index = SearchIndex {
            built_at: Utc::now(),
            documents,
            postings,
            stats: IndexStats {
                note_count,
                token_count: total_tokens,
            },
        };

        let output_path = self.output_dir.join(INDEX_FILE);
        fs::write(&output_path, serde_json::to_string_pretty(&index)?)?;
        info!(notes = note_count, path = %output_path.display(), "index built");
        Ok(IndexBuildResult {
            output_path,
            note_count,
            token_count: total_tokens,
        })
    }
}

fn accumulate(merged: &mut BTreeMap<String, f64>, tokens: Vec<String>, weight: f64) {
    for token in tokens {
        *merged.entry(token).or_default() += weight;
    }
}

fn normalize_postings(
    raw: BTreeMap<String, Vec<Posting>>,
    document_freq: &BTreeMap<String, usize>,
    document_count: usize,
) -> BTreeMap<String, Vec<Posting>> {
    raw.into_iter()
        .map(|(token, mut entries)| {
            let df = document_freq.get(&token).copied().unwrap_or(0);
            let idf = (1.0 + document_count as f64 / (1.0 + df as f64)).ln();
            entries.sort_by(|a, b| b.score.total_cmp(&a.score));
            let scaled = entries
                .into_iter()
                .map(|p| Posting {
                    note_id: p.note_id,
                    score: round4(p.score * idf),
                })
                .collect();
            (token, scaled)
        })
        .collect()
}

/// Summary text and keywords from the latest enrichment, falling back
/// to whatever extraction was written last.
fn latest_summary(bundle: &NoteBundle) -> (String, Vec<String>) {
    let extraction = bundle
        .latest_extraction(ENHANCE_PREFIX)
        .or_else(|| bundle.last_extraction());
    let Some(extraction) = extraction else {
        return (String::new(), Vec::new());
    };
    let summary = match extraction.payload.get("summary") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let keywords = extraction
        .payload
        .get("keywords")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    (summary, keywords)
}

pub(crate) fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub fn load_index(path: &Path) -> Result<SearchIndex> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notemill_core::entities::{
        ContentVariant, Extraction, IngestSource, Note, ProcessingJournalEntry,
    };
    use serde_json::json;

    fn seed_note(store: &NoteStore, title: &str, text: &str, keywords: &[&str]) -> String {
        let source = IngestSource::new("evernote_html", "/exports/x.html");
        let note = Note::new(source.id, title, "en");
        let clean =
            ContentVariant::new(note.id, VariantType::CleanText, "test").with_content(text);
        let extraction = Extraction::new(
            note.id,
            "llm_enhance:v0#m",
            json!({"summary": format!("about {}", title), "keywords": keywords}),
        );
        let journal = ProcessingJournalEntry::new(Some(note.id), "ingest", "test", "success");
        store
            .save_note_bundle(&source, &note, &[clean], &[extraction], &journal)
            .expect("save");
        note.id.to_string()
    }

    #[test]
    fn test_build_weights_keywords_highest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        let id = seed_note(&store, "Python tips", "notes about python", &["python"]);

        let builder = IndexBuilder::new(NoteStore::new(dir.path()).expect("store"), dir.path());
        let result = builder.build(0).expect("build");
        assert_eq!(result.note_count, 1);

        let index = load_index(&result.output_path).expect("load");
        let postings = index.postings.get("python").expect("postings");
        assert_eq!(postings[0].note_id, id);
        // clean(1.0) + summary(1.5) + keyword(2.0), scaled by ln(1 + 1/2).
        let expected = round4(4.5 * (1.0f64 + 1.0 / 2.0).ln());
        assert_eq!(postings[0].score, expected);
    }

    #[test]
    fn test_postings_are_sorted_by_score() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        let strong = seed_note(&store, "Rust deep dive", "rust rust rust", &["rust"]);
        let weak = seed_note(&store, "Misc", "rust mentioned once", &[]);

        let builder = IndexBuilder::new(NoteStore::new(dir.path()).expect("store"), dir.path());
        let result = builder.build(0).expect("build");
        let index = load_index(&result.output_path).expect("load");

        let postings = index.postings.get("rust").expect("postings");
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].note_id, strong);
        assert_eq!(postings[1].note_id, weak);
        assert!(postings[0].score > postings[1].score);
    }

    #[test]
    fn test_limit_caps_indexed_notes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        seed_note(&store, "One", "alpha", &[]);
        seed_note(&store, "Two", "beta", &[]);

        let builder = IndexBuilder::new(NoteStore::new(dir.path()).expect("store"), dir.path());
        let result = builder.build(1).expect("build");
        assert_eq!(result.note_count, 1);
    }
}
