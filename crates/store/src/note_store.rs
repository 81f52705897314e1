//! Directory-per-note persistence
//!
//! Layout under the JSON root:
//!
//! ```text
//! notes/<note-id>/metadata.json
//! notes/<note-id>/raw/v<N>.html
//! notes/<note-id>/clean/v<N>.txt
//! notes/<note-id>/extractions/<extraction-id>.json
//! ```
//!
//! Variant content is written out-of-line per the variant type's storage
//! policy; `metadata.json` keeps a path reference relative to the note
//! root. Loading resolves inline-vs-path content transparently, so
//! hand-authored bundles with inline content still load.

use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use notemill_core::entities::{
    ContentVariant, Extraction, IngestSource, Note, ProcessingJournalEntry, VariantStorage,
    VariantType,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Quality breakdown recorded by the enrichment agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityBreakdown {
    pub score: f64,
    pub metrics: Value,
}

/// Latest enrichment snapshot embedded in `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    pub status: String,
    pub model: String,
    pub updated_at: DateTime<Utc>,
    pub latency_seconds: Option<f64>,
    pub summary: Value,
    pub quality: QualityBreakdown,
}

/// The typed `metadata.json` document for one note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub source: IngestSource,
    pub note: Note,
    pub variants: Vec<ContentVariant>,
    #[serde(default)]
    pub extractions: Vec<Extraction>,
    pub journal: ProcessingJournalEntry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LlmSection>,
}

/// One note's metadata plus the directory needed to resolve content.
#[derive(Debug, Clone)]
pub struct NoteBundle {
    pub metadata: NoteMetadata,
    note_root: PathBuf,
}

impl NoteBundle {
    pub fn note(&self) -> &Note {
        &self.metadata.note
    }

    /// Latest variant of the given type, by version.
    pub fn variant(&self, variant_type: VariantType) -> Option<&ContentVariant> {
        self.metadata
            .variants
            .iter()
            .filter(|v| v.variant_type == variant_type)
            .max_by_key(|v| v.version)
    }

    /// Resolve a variant's content, inline or via its path reference.
    pub fn variant_content(&self, variant: &ContentVariant) -> Result<String> {
        if let Some(content) = &variant.content {
            return Ok(content.clone());
        }
        if let Some(rel) = &variant.content_path {
            let path = if Path::new(rel).is_absolute() {
                PathBuf::from(rel)
            } else {
                self.note_root.join(rel)
            };
            return Ok(fs::read_to_string(path)?);
        }
        Err(StoreError::MissingContent(variant.id.to_string()))
    }

    /// Content of the latest variant of the given type.
    pub fn latest_content(&self, variant_type: VariantType) -> Result<String> {
        let variant = self.variant(variant_type).ok_or_else(|| {
            StoreError::MissingContent(format!(
                "{} variant for note {}",
                variant_type.as_str(),
                self.metadata.note.id
            ))
        })?;
        self.variant_content(variant)
    }

    /// Latest extraction whose extractor id starts with the given prefix.
    pub fn latest_extraction(&self, extractor_prefix: &str) -> Option<&Extraction> {
        self.metadata
            .extractions
            .iter()
            .filter(|e| e.extractor.starts_with(extractor_prefix))
            .max_by_key(|e| e.version)
    }

    /// Latest extraction overall, used when no preferred extractor ran.
    pub fn last_extraction(&self) -> Option<&Extraction> {
        self.metadata.extractions.last()
    }
}

/// Filesystem store for note bundles.
#[derive(Debug, Clone)]
pub struct NoteStore {
    json_root: PathBuf,
}

impl NoteStore {
    pub fn new(json_root: impl Into<PathBuf>) -> Result<Self> {
        let json_root = json_root.into();
        fs::create_dir_all(json_root.join("notes"))?;
        Ok(Self { json_root })
    }

    pub fn json_root(&self) -> &Path {
        &self.json_root
    }

    pub fn journal_root(&self) -> PathBuf {
        self.json_root.join("_journal")
    }

    fn note_root(&self, note_id: &str) -> PathBuf {
        self.json_root.join("notes").join(note_id)
    }

    /// Persist a full bundle, returning the note's directory.
    ///
    /// Variant content goes out-of-line when the variant type's storage
    /// policy says so; the metadata document then carries a relative
    /// path reference instead of the content itself.
    pub fn save_note_bundle(
        &self,
        source: &IngestSource,
        note: &Note,
        variants: &[ContentVariant],
        extractions: &[Extraction],
        journal: &ProcessingJournalEntry,
    ) -> Result<PathBuf> {
        let note_root = self.note_root(&note.id.to_string());
        fs::create_dir_all(&note_root)?;

        let mut stored_variants = Vec::with_capacity(variants.len());
        for variant in variants {
            stored_variants.push(self.store_variant_content(&note_root, variant)?);
        }

        let extraction_dir = note_root.join("extractions");
        for extraction in extractions {
            fs::create_dir_all(&extraction_dir)?;
            let path = extraction_dir.join(format!("{}.json", extraction.id));
            fs::write(path, serde_json::to_string_pretty(extraction)?)?;
        }

        let metadata = NoteMetadata {
            source: source.clone(),
            note: note.clone(),
            variants: stored_variants,
            extractions: extractions.to_vec(),
            journal: journal.clone(),
            llm: None,
        };
        self.write_metadata(&note_root, &metadata)?;
        debug!(note_id = %note.id, "saved note bundle");
        Ok(note_root)
    }

    /// Load a note bundle; fails with NotFound for unknown ids.
    pub fn load_note_bundle(&self, note_id: &str) -> Result<NoteBundle> {
        let note_root = self.note_root(note_id);
        let metadata_path = note_root.join("metadata.json");
        if !metadata_path.exists() {
            return Err(StoreError::NotFound(note_id.to_string()));
        }
        let raw = fs::read_to_string(metadata_path)?;
        let metadata: NoteMetadata = serde_json::from_str(&raw)?;
        Ok(NoteBundle {
            metadata,
            note_root,
        })
    }

    /// Note ids in directory-name order. Restartable: each call rescans.
    pub fn list_note_ids(&self) -> Result<impl Iterator<Item = String>> {
        let notes_dir = self.json_root.join("notes");
        let mut ids: Vec<String> = fs::read_dir(notes_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        ids.sort();
        Ok(ids.into_iter())
    }

    /// Persist a new extraction and update the note's metadata document,
    /// optionally refreshing the `llm` section. Used by the enrichment
    /// agent; the extraction's version must already be assigned.
    pub fn append_extraction(
        &self,
        note_id: &str,
        extraction: &Extraction,
        llm: Option<LlmSection>,
    ) -> Result<()> {
        let bundle = self.load_note_bundle(note_id)?;
        let note_root = bundle.note_root.clone();

        let extraction_dir = note_root.join("extractions");
        fs::create_dir_all(&extraction_dir)?;
        let path = extraction_dir.join(format!("{}.json", extraction.id));
        fs::write(path, serde_json::to_string_pretty(extraction)?)?;

        let mut metadata = bundle.metadata;
        metadata.extractions.push(extraction.clone());
        if llm.is_some() {
            metadata.llm = llm;
        }
        self.write_metadata(&note_root, &metadata)?;
        Ok(())
    }

    fn write_metadata(&self, note_root: &Path, metadata: &NoteMetadata) -> Result<()> {
        let path = note_root.join("metadata.json");
        fs::write(path, serde_json::to_string_pretty(metadata)?)?;
        Ok(())
    }

    fn store_variant_content(
        &self,
        note_root: &Path,
        variant: &ContentVariant,
    ) -> Result<ContentVariant> {
        match variant.variant_type.storage() {
            VariantStorage::Inline => Ok(variant.clone()),
            VariantStorage::OutOfLine => {
                let content = variant.content.as_deref().ok_or_else(|| {
                    StoreError::MissingContent(variant.id.to_string())
                })?;
                let subdir = note_root.join(variant.variant_type.subdir());
                fs::create_dir_all(&subdir)?;
                let file_name = format!(
                    "v{}.{}",
                    variant.version,
                    variant.variant_type.file_extension()
                );
                fs::write(subdir.join(&file_name), content)?;
                let rel = format!("{}/{}", variant.variant_type.subdir(), file_name);
                Ok(variant.clone().with_content_path(rel))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notemill_core::entities::VariantType;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_bundle() -> (IngestSource, Note, Vec<ContentVariant>, ProcessingJournalEntry) {
        let source = IngestSource::new("evernote_html", "/exports/a.html");
        let note = Note::new(source.id, "Sample", "en");
        let raw = ContentVariant::new(note.id, VariantType::RawHtml, "test")
            .with_content("<html><body>hi</body></html>");
        let clean = ContentVariant::new(note.id, VariantType::CleanText, "test")
            .with_content("hi");
        let journal = ProcessingJournalEntry::new(Some(note.id), "ingest", "test", "success");
        (source, note, vec![raw, clean], journal)
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        let (source, note, variants, journal) = sample_bundle();

        store
            .save_note_bundle(&source, &note, &variants, &[], &journal)
            .expect("save");

        let bundle = store.load_note_bundle(&note.id.to_string()).expect("load");
        assert_eq!(
            bundle.latest_content(VariantType::RawHtml).expect("raw"),
            "<html><body>hi</body></html>"
        );
        assert_eq!(
            bundle.latest_content(VariantType::CleanText).expect("clean"),
            "hi"
        );
    }

    #[test]
    fn test_out_of_line_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        let (source, note, variants, journal) = sample_bundle();

        let note_root = store
            .save_note_bundle(&source, &note, &variants, &[], &journal)
            .expect("save");

        assert!(note_root.join("metadata.json").exists());
        assert!(note_root.join("raw/v1.html").exists());
        assert!(note_root.join("clean/v1.txt").exists());

        // Stored variants reference paths, never inline content.
        let bundle = store.load_note_bundle(&note.id.to_string()).expect("load");
        for variant in &bundle.metadata.variants {
            assert!(variant.content.is_none());
            assert!(variant.content_path.is_some());
            assert!(variant.has_persisted_content());
        }
    }

    #[test]
    fn test_load_missing_note_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        let err = store
            .load_note_bundle(&Uuid::new_v4().to_string())
            .expect_err("must fail");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_list_note_ids_sorted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        for _ in 0..3 {
            let (source, note, variants, journal) = sample_bundle();
            store
                .save_note_bundle(&source, &note, &variants, &[], &journal)
                .expect("save");
        }

        let ids: Vec<String> = store.list_note_ids().expect("list").collect();
        assert_eq!(ids.len(), 3);
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_append_extraction_updates_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        let (source, note, variants, journal) = sample_bundle();
        store
            .save_note_bundle(&source, &note, &variants, &[], &journal)
            .expect("save");

        let extraction = Extraction::new(note.id, "llm_enhance:v0#m", json!({"summary": "s"}))
            .with_version(1);
        let llm = LlmSection {
            status: "success".into(),
            model: "m".into(),
            updated_at: Utc::now(),
            latency_seconds: Some(0.5),
            summary: json!({"summary": "s"}),
            quality: QualityBreakdown {
                score: 0.5,
                metrics: json!({}),
            },
        };
        store
            .append_extraction(&note.id.to_string(), &extraction, Some(llm))
            .expect("append");

        let bundle = store.load_note_bundle(&note.id.to_string()).expect("load");
        assert_eq!(bundle.metadata.extractions.len(), 1);
        assert!(bundle.metadata.llm.is_some());
        assert!(bundle
            .note_root
            .join(format!("extractions/{}.json", extraction.id))
            .exists());
        assert_eq!(
            bundle
                .latest_extraction("llm_enhance:v0")
                .map(|e| e.version),
            Some(1)
        );
    }

    #[test]
    fn test_inline_variant_resolves_transparently() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NoteStore::new(dir.path()).expect("store");
        let (source, note, mut variants, journal) = sample_bundle();
        store
            .save_note_bundle(&source, &note, &variants, &[], &journal)
            .expect("save");

        // Simulate a hand-authored bundle carrying inline content.
        let inline = variants.pop().expect("variant");
        let bundle = store.load_note_bundle(&note.id.to_string()).expect("load");
        assert_eq!(bundle.variant_content(&inline).expect("content"), "hi");
    }
}
