//! Filesystem persistence for notemill
//!
//! Notes are stored as one directory per note under a configured JSON
//! root, with a typed `metadata.json` document referencing out-of-line
//! variant content. The processing journal is an append-only JSONL file
//! with a rolling metrics fold next to it.
//!
//! The store performs no locking: callers must not concurrently write
//! the same note id.

pub mod checksum;
pub mod diff;
pub mod error;
pub mod journal;
pub mod note_store;

pub use checksum::compute_file_checksum;
pub use diff::{DiffStats, VersionDiff, VersionDiffer};
pub use error::{Result, StoreError};
pub use journal::{JournalMetrics, JournalWriter};
pub use note_store::{LlmSection, NoteBundle, NoteMetadata, NoteStore, QualityBreakdown};
