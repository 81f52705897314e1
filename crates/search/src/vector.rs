//! Bag-of-words vector search prototype
//!
//! Encodes texts as L2-normalized token frequency maps and ranks by
//! cosine similarity. Kept deliberately small; it shares the tokenizer
//! with the inverted index so both sides agree on terms.

use crate::error::Result;
use crate::index::round4;
use crate::tokenize::tokenize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub type Embedding = BTreeMap<String, f64>;

#[derive(Debug, Clone, Serialize)]
pub struct VectorHit {
    pub note_id: String,
    pub score: f64,
}

/// Token-frequency encoder with unit L2 norm.
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorEncoder;

impl VectorEncoder {
    pub fn encode(&self, text: &str) -> Embedding {
        let mut counts: BTreeMap<String, f64> = BTreeMap::new();
        for token in tokenize(text) {
            *counts.entry(token).or_default() += 1.0;
        }
        if counts.is_empty() {
            return counts;
        }
        let norm = counts.values().map(|c| c * c).sum::<f64>().sqrt().max(1.0);
        counts.values_mut().for_each(|c| *c /= norm);
        counts
    }
}

/// JSON-file-backed store of note embeddings.
pub struct VectorStore {
    storage_path: PathBuf,
    encoder: VectorEncoder,
    vectors: BTreeMap<String, Embedding>,
}

impl VectorStore {
    pub fn open(storage_path: impl Into<PathBuf>) -> Result<Self> {
        let storage_path = storage_path.into();
        let vectors = if storage_path.exists() {
            serde_json::from_str(&fs::read_to_string(&storage_path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            storage_path,
            encoder: VectorEncoder,
            vectors,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn upsert(&mut self, note_id: impl Into<String>, text: &str) {
        self.vectors.insert(note_id.into(), self.encoder.encode(text));
    }

    pub fn bulk_upsert(&mut self, items: impl IntoIterator<Item = (String, String)>) {
        for (note_id, text) in items {
            self.upsert(note_id, &text);
        }
    }

    pub fn search(&self, query: &str, limit: usize, min_score: f64) -> Vec<VectorHit> {
        let query_vec = self.encoder.encode(query);
        if query_vec.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<VectorHit> = self
            .vectors
            .iter()
            .filter_map(|(note_id, vector)| {
                let score = cosine_similarity(&query_vec, vector);
                (score >= min_score).then(|| VectorHit {
                    note_id: note_id.clone(),
                    score: round4(score),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        if limit > 0 {
            hits.truncate(limit);
        }
        hits
    }

    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.storage_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(
            &self.storage_path,
            serde_json::to_string_pretty(&self.vectors)?,
        )?;
        Ok(())
    }
}

fn cosine_similarity(a: &Embedding, b: &Embedding) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let numerator: f64 = a
        .iter()
        .filter_map(|(token, va)| b.get(token).map(|vb| va * vb))
        .sum();
    let norm_a = a.values().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    numerator / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_is_unit_norm() {
        let embedding = VectorEncoder.encode("rust rust notes");
        let norm: f64 = embedding.values().map(|v| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        assert!(embedding["rust"] > embedding["notes"]);
    }

    #[test]
    fn test_empty_text_encodes_empty() {
        assert!(VectorEncoder.encode("").is_empty());
        assert!(VectorEncoder.encode("! ?").is_empty());
    }

    #[test]
    fn test_search_ranks_by_cosine() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = VectorStore::open(dir.path().join("vector_store.json")).expect("open");
        store.upsert("close", "rust ownership notes");
        store.upsert("far", "gardening weekend plans");

        let hits = store.search("rust ownership", 5, 0.1);
        assert_eq!(hits[0].note_id, "close");
        assert!(hits.iter().all(|h| h.note_id != "far"));
    }

    #[test]
    fn test_persist_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vector_store.json");
        let mut store = VectorStore::open(&path).expect("open");
        store.upsert("n1", "alpha beta");
        store.persist().expect("persist");

        let reloaded = VectorStore::open(&path).expect("reopen");
        assert_eq!(reloaded.len(), 1);
        let hits = reloaded.search("alpha", 5, 0.1);
        assert_eq!(hits[0].note_id, "n1");
    }
}
