//! Ranked queries over the inverted index

use crate::error::{Result, SearchError};
use crate::index::{load_index, round4, IndexBuilder, SearchIndex, INDEX_FILE};
use crate::tokenize::tokenize;
use notemill_store::NoteStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub note_id: String,
    pub title: String,
    pub language: String,
    pub score: f64,
    pub summary: String,
    pub keywords: Vec<String>,
}

/// Index-wide counters exposed by `stats`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub notes_indexed: usize,
    pub tokens_indexed: f64,
    pub unique_terms: usize,
}

/// Read-side engine over a built index.
pub struct QueryEngine {
    index: SearchIndex,
}

impl QueryEngine {
    /// Open an existing index file.
    pub fn open(index_path: &Path) -> Result<Self> {
        if !index_path.exists() {
            return Err(SearchError::IndexNotFound(index_path.to_path_buf()));
        }
        Ok(Self {
            index: load_index(index_path)?,
        })
    }

    /// Open the index under `output_dir`, building it from the store
    /// first when it does not exist yet.
    pub fn open_or_build(store: NoteStore, output_dir: &Path) -> Result<Self> {
        let index_path: PathBuf = output_dir.join(INDEX_FILE);
        if !index_path.exists() {
            IndexBuilder::new(store, output_dir).build(0)?;
        }
        Self::open(&index_path)
    }

    /// Sum posting scores per note for each query token, then filter
    /// and rank. An empty or all-stopword query yields no hits.
    pub fn search(
        &self,
        query: &str,
        language: Option<&str>,
        limit: usize,
        min_score: f64,
    ) -> Vec<SearchHit> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut accumulator: BTreeMap<&str, f64> = BTreeMap::new();
        for token in &tokens {
            if let Some(postings) = self.index.postings.get(token) {
                for posting in postings {
                    *accumulator.entry(posting.note_id.as_str()).or_default() += posting.score;
                }
            }
        }

        let mut scored: Vec<(&str, f64)> = accumulator.into_iter().collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut hits = Vec::new();
        for (note_id, score) in scored {
            if score < min_score {
                continue;
            }
            let Some(doc) = self.index.documents.get(note_id) else {
                continue;
            };
            if let Some(language) = language {
                if doc.language != language {
                    continue;
                }
            }
            hits.push(SearchHit {
                note_id: note_id.to_string(),
                title: doc.title.clone(),
                language: doc.language.clone(),
                score: round4(score),
                summary: doc.summary.clone(),
                keywords: doc.keywords.clone(),
            });
            if limit > 0 && hits.len() >= limit {
                break;
            }
        }
        hits
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            notes_indexed: self.index.stats.note_count,
            tokens_indexed: self.index.stats.token_count,
            unique_terms: self.index.postings.len(),
        }
    }
}
