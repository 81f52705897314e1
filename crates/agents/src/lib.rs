//! Pipeline agents for notemill
//!
//! Two agents drive the pipeline: the ingest agent turns exported HTML
//! files into note bundles, and the enrich agent asks LLM backends for
//! structured summaries. Model access goes through a dispatcher that
//! handles fallback ordering, timeouts, and run logging.

pub mod batch;
pub mod categories;
pub mod client;
pub mod dispatcher;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod prompts;
pub mod quality;

pub use batch::{BatchIngestor, BatchSummary};
pub use categories::CategoryCatalog;
pub use client::{LlmClient, ModelConfig, OllamaClient, Provider};
pub use dispatcher::{try_parse_json, Dispatcher, ExpectedFormat, LlmResponse};
pub use enrich::{
    fallback_payload, normalize_llm_payload, EnhanceOutcome, EnhanceStatus, EnrichAgent,
    SummaryPayload,
};
pub use error::{AgentError, Result};
pub use ingest::IngestAgent;
pub use quality::{compute_quality_metrics, score_quality, QualityMetrics};
