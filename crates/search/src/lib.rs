//! Search layer for notemill
//!
//! An inverted index built from note clean text and enrichment output,
//! a ranked query engine over it, a bag-of-words vector prototype, and
//! the HTTP API that exposes the query side.

pub mod error;
pub mod index;
pub mod query;
pub mod server;
pub mod tokenize;
pub mod vector;

pub use error::{Result, SearchError};
pub use index::{IndexBuildResult, IndexBuilder, SearchIndex, INDEX_FILE};
pub use query::{EngineStats, QueryEngine, SearchHit};
pub use server::{app, serve};
pub use tokenize::tokenize;
pub use vector::{VectorEncoder, VectorHit, VectorStore};
