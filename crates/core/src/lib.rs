//! Core domain types for notemill
//!
//! This crate defines the fundamental data structures used throughout
//! the pipeline: ingest sources, notes, content variants, extractions,
//! and the processing journal, plus the rule-based cleaning engine and
//! the text utilities shared by the agents.

pub mod cleaning;
pub mod entities;
pub mod error;
pub mod html;
pub mod tasks;

pub use cleaning::{apply_rules, AppliedRule, CleaningContext, CleaningResult};
pub use entities::{
    ContentVariant, Extraction, IngestSource, Note, NoteStatus, ProcessingJournalEntry,
    VariantStorage, VariantType,
};
pub use error::{CoreError, Result};
pub use html::{extract_text_from_html, guess_language};
pub use tasks::{IngestResult, IngestStatus, IngestTask, TaskPayload};
