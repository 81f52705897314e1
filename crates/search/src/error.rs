//! Error types for the search crate

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Index not found at {0}; build it first")]
    IndexNotFound(PathBuf),

    #[error("Store error: {0}")]
    Store(#[from] notemill_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SearchError>;
