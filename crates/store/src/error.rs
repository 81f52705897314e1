//! Error types for the note store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Note not found: {0}")]
    NotFound(String),

    #[error("Variant has no persisted content: {0}")]
    MissingContent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
