//! Error types for the core domain

use thiserror::Error;

/// Core domain errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid task payload: {0}")]
    InvalidTask(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
