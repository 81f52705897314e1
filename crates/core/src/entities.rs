//! Persistent entities for the ingest pipeline
//!
//! Every record here is append-only once persisted: a new version of a
//! note's content is a new `ContentVariant`, a re-enrichment is a new
//! `Extraction`, and journal entries are never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Free-form attribute map carried by several entities.
pub type AttrMap = BTreeMap<String, Value>;

/// Lifecycle status of a note.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    Active,
    Archived,
}

impl Default for NoteStatus {
    fn default() -> Self {
        Self::Active
    }
}

/// Representation of a note's content carried by a variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VariantType {
    RawHtml,
    CleanText,
}

/// Where a variant's content lives once persisted.
///
/// The strategy is fixed per variant type, not chosen per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantStorage {
    Inline,
    OutOfLine,
}

impl VariantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RawHtml => "raw_html",
            Self::CleanText => "clean_text",
        }
    }

    /// Subdirectory under the note root holding out-of-line content.
    pub fn subdir(&self) -> &'static str {
        match self {
            Self::RawHtml => "raw",
            Self::CleanText => "clean",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::RawHtml => "html",
            Self::CleanText => "txt",
        }
    }

    /// Storage strategy for this variant type.
    pub fn storage(&self) -> VariantStorage {
        match self {
            Self::RawHtml | Self::CleanText => VariantStorage::OutOfLine,
        }
    }
}

/// One physical input artifact behind a note. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSource {
    pub id: Uuid,
    pub source_type: String,
    pub source_path: String,
    pub collected_at: DateTime<Utc>,
    pub external_id: Option<String>,
    pub title_hint: Option<String>,
    pub language_hint: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    #[serde(default)]
    pub notes: AttrMap,
}

impl IngestSource {
    pub fn new(source_type: impl Into<String>, source_path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_type: source_type.into(),
            source_path: source_path.into(),
            collected_at: Utc::now(),
            external_id: None,
            title_hint: None,
            language_hint: None,
            captured_at: None,
            checksum: None,
            notes: AttrMap::new(),
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_title_hint(mut self, title_hint: impl Into<String>) -> Self {
        self.title_hint = Some(title_hint.into());
        self
    }

    pub fn with_language_hint(mut self, language_hint: impl Into<String>) -> Self {
        self.language_hint = Some(language_hint.into());
        self
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    pub fn with_note(mut self, key: impl Into<String>, value: Value) -> Self {
        self.notes.insert(key.into(), value);
        self
    }
}

/// The canonical logical record for one piece of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub ingest_source_id: Uuid,
    pub canonical_title: String,
    pub language: String,
    pub ingested_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: NoteStatus,
    #[serde(default)]
    pub importance: i64,
    #[serde(default)]
    pub attributes: AttrMap,
}

impl Note {
    pub fn new(
        ingest_source_id: Uuid,
        canonical_title: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ingest_source_id,
            canonical_title: canonical_title.into(),
            language: language.into(),
            ingested_at: Utc::now(),
            created_at: None,
            status: NoteStatus::Active,
            importance: 0,
            attributes: AttrMap::new(),
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// One immutable, versioned textual representation of a note.
///
/// Exactly one of `content` / `content_path` is set once fully persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentVariant {
    pub id: Uuid,
    pub note_id: Uuid,
    pub variant_type: VariantType,
    pub version: u32,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub content: Option<String>,
    pub content_path: Option<String>,
    pub diff_base_variant_id: Option<Uuid>,
    #[serde(default)]
    pub metadata: AttrMap,
}

impl ContentVariant {
    pub fn new(note_id: Uuid, variant_type: VariantType, created_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            note_id,
            variant_type,
            version: 1,
            created_by: created_by.into(),
            created_at: Utc::now(),
            content: None,
            content_path: None,
            diff_base_variant_id: None,
            metadata: AttrMap::new(),
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets inline content, clearing any path reference.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self.content_path = None;
        self
    }

    /// Sets a path reference, clearing any inline content.
    pub fn with_content_path(mut self, content_path: impl Into<String>) -> Self {
        self.content_path = Some(content_path.into());
        self.content = None;
        self
    }

    pub fn with_diff_base(mut self, variant_id: Uuid) -> Self {
        self.diff_base_variant_id = Some(variant_id);
        self
    }

    pub fn with_metadata(mut self, metadata: AttrMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn has_persisted_content(&self) -> bool {
        self.content.is_some() != self.content_path.is_some()
    }
}

/// One structured enrichment result produced by an extractor+model pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    pub id: Uuid,
    pub note_id: Uuid,
    pub extractor: String,
    pub payload: Value,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub quality_score: Option<f64>,
}

impl Extraction {
    pub fn new(note_id: Uuid, extractor: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            note_id,
            extractor: extractor.into(),
            payload,
            version: 1,
            created_at: Utc::now(),
            created_by: "system".to_string(),
            quality_score: None,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    pub fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = Some(score);
        self
    }
}

/// Append-only audit record of one pipeline step attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJournalEntry {
    pub id: Uuid,
    pub note_id: Option<Uuid>,
    pub stage: String,
    pub agent_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: String,
    #[serde(default)]
    pub input_ref: AttrMap,
    #[serde(default)]
    pub output_ref: AttrMap,
    pub error_detail: Option<String>,
}

impl ProcessingJournalEntry {
    pub fn new(
        note_id: Option<Uuid>,
        stage: impl Into<String>,
        agent_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            note_id,
            stage: stage.into(),
            agent_id: agent_id.into(),
            started_at: now,
            finished_at: now,
            status: status.into(),
            input_ref: AttrMap::new(),
            output_ref: AttrMap::new(),
            error_detail: None,
        }
    }

    pub fn with_span(mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self.finished_at = finished_at;
        self
    }

    pub fn with_input_ref(mut self, key: impl Into<String>, value: Value) -> Self {
        self.input_ref.insert(key.into(), value);
        self
    }

    pub fn with_output_ref(mut self, key: impl Into<String>, value: Value) -> Self {
        self.output_ref.insert(key.into(), value);
        self
    }

    pub fn with_error_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }
}
