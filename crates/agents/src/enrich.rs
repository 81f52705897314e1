//! Enrichment agent
//!
//! Loads a note's cleaned text, asks the dispatcher for a structured
//! summary, normalizes whatever comes back into a `SummaryPayload`, and
//! persists it as a new versioned extraction. A failed dispatch still
//! produces a deterministic fallback payload so every enriched note has
//! a usable summary.

use crate::categories::CategoryCatalog;
use crate::dispatcher::Dispatcher;
use crate::error::{AgentError, Result};
use crate::quality::{compute_quality_metrics, score_quality};
use chrono::Utc;
use notemill_core::entities::{Extraction, ProcessingJournalEntry, VariantType};
use notemill_store::{JournalWriter, LlmSection, NoteStore, QualityBreakdown, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

pub const AGENT_ID: &str = "llm_enhance:v0";

const SUMMARY_MAX_CHARS: usize = 80;
const KEYWORD_COUNT: usize = 5;
const CATALOG_GUIDANCE_LINES: usize = 80;

/// Normalized enrichment payload stored on the extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryPayload {
    pub summary: String,
    pub keywords: Vec<String>,
    pub action_items: Vec<String>,
    /// Model name that produced the payload, or `"fallback"`.
    pub source: String,
    pub category_path: Vec<String>,
    pub new_category_suggestion: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhanceStatus {
    Success,
    Fallback,
}

impl EnhanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fallback => "fallback",
        }
    }
}

/// What one enrichment run produced.
#[derive(Debug, Clone)]
pub struct EnhanceOutcome {
    pub note_id: String,
    pub status: EnhanceStatus,
    pub model: String,
    pub extraction_id: Uuid,
    pub quality_score: f64,
    pub latency_seconds: f64,
}

/// Agent that summarizes notes through the LLM dispatcher.
pub struct EnrichAgent {
    store: NoteStore,
    dispatcher: Dispatcher,
    journal: JournalWriter,
    catalog: Option<CategoryCatalog>,
}

impl EnrichAgent {
    /// Picks up `categories.json` from the store root when present.
    pub fn new(store: NoteStore, dispatcher: Dispatcher) -> Result<Self> {
        let journal = JournalWriter::new(store.journal_root())?;
        let catalog = CategoryCatalog::load(&store.json_root().join("categories.json"))?;
        Ok(Self {
            store,
            dispatcher,
            journal,
            catalog,
        })
    }

    pub fn with_catalog(mut self, catalog: CategoryCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub async fn enhance_note(
        &self,
        note_id: &str,
        models: Option<&[String]>,
    ) -> Result<EnhanceOutcome> {
        let bundle = self
            .store
            .load_note_bundle(note_id)
            .map_err(|err| match err {
                StoreError::NotFound(_) => AgentError::NotFound(format!("note {}", note_id)),
                other => AgentError::Store(other),
            })?;
        let clean_text = bundle.latest_content(VariantType::CleanText)?;
        let title = bundle.note().canonical_title.clone();
        let language = bundle.note().language.clone();

        let guidance = self
            .catalog
            .as_ref()
            .filter(|c| !c.is_empty())
            .map(|c| c.render_guidance(CATALOG_GUIDANCE_LINES));

        let started_at = Utc::now();
        let response = self
            .dispatcher
            .summarize_note(&title, &clean_text, &language, models, guidance.as_deref())
            .await?;
        let finished_at = Utc::now();

        let (payload, status) = match (&response.parsed, response.succeeded) {
            (Some(parsed), true) if parsed.is_object() => {
                let mut payload = normalize_llm_payload(parsed, &response.model);
                if let Some(catalog) = &self.catalog {
                    if let Some(canonical) = catalog.canonicalize_path(&payload.category_path) {
                        payload.category_path = canonical;
                    }
                }
                (payload, EnhanceStatus::Success)
            }
            _ => {
                warn!(note_id, error = ?response.error, "dispatch failed, using fallback payload");
                (fallback_payload(&clean_text), EnhanceStatus::Fallback)
            }
        };

        let metrics = compute_quality_metrics(&clean_text, &payload);
        let quality_score = score_quality(status, &metrics);
        let model_used = payload.source.clone();
        let payload_value = serde_json::to_value(&payload)?;

        let next_version = bundle
            .metadata
            .extractions
            .iter()
            .filter(|e| e.extractor.starts_with(AGENT_ID))
            .map(|e| e.version)
            .max()
            .unwrap_or(0)
            + 1;
        let extraction = Extraction::new(
            bundle.note().id,
            format!("{}#{}", AGENT_ID, model_used),
            payload_value.clone(),
        )
        .with_version(next_version)
        .with_created_by(AGENT_ID)
        .with_quality_score(quality_score);
        let extraction_id = extraction.id;

        let llm_section = LlmSection {
            status: status.as_str().to_string(),
            model: model_used.clone(),
            updated_at: finished_at,
            latency_seconds: Some(response.latency_seconds),
            summary: payload_value,
            quality: QualityBreakdown {
                score: quality_score,
                metrics: serde_json::to_value(&metrics)?,
            },
        };
        self.store
            .append_extraction(note_id, &extraction, Some(llm_section))?;

        let mut entry = ProcessingJournalEntry::new(
            Uuid::parse_str(note_id).ok(),
            "llm_enhance",
            AGENT_ID,
            if response.succeeded {
                "success"
            } else {
                "failed"
            },
        )
        .with_span(started_at, finished_at)
        .with_input_ref("note_id", json!(note_id))
        .with_input_ref("requested_models", json!(models))
        .with_input_ref("dispatcher_model", json!(response.model))
        .with_output_ref("extraction_id", json!(extraction_id))
        .with_output_ref("status", json!(status.as_str()))
        .with_output_ref("quality_score", json!(quality_score));
        if !response.succeeded {
            if let Some(error) = &response.error {
                entry = entry.with_error_detail(error.clone());
            }
        }
        self.journal.write(&entry)?;

        info!(note_id, status = status.as_str(), model = %model_used, "note enriched");
        Ok(EnhanceOutcome {
            note_id: note_id.to_string(),
            status,
            model: model_used,
            extraction_id,
            quality_score,
            latency_seconds: response.latency_seconds,
        })
    }
}

/// Coerce a parsed model reply into the payload shape: summary clipped
/// to 80 chars, exactly 5 deduplicated keywords, non-empty action items
/// or the `"none"` sentinel, and a trimmed category path.
pub fn normalize_llm_payload(raw: &Value, model_name: &str) -> SummaryPayload {
    let mut summary = value_to_text(raw.get("summary")).trim().to_string();
    if summary.is_empty() {
        summary = "(empty summary)".to_string();
    }
    summary = clip_chars(&summary, SUMMARY_MAX_CHARS);

    let mut keywords: Vec<String> = Vec::new();
    if let Some(items) = raw.get("keywords").and_then(Value::as_array) {
        for item in items {
            let token = value_to_text(Some(item)).trim().to_string();
            if !token.is_empty() && !keywords.contains(&token) {
                keywords.push(token);
            }
            if keywords.len() == KEYWORD_COUNT {
                break;
            }
        }
    }
    while keywords.len() < KEYWORD_COUNT {
        keywords.push("pending".to_string());
    }

    let mut action_items: Vec<String> = raw
        .get("action_items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| value_to_text(Some(item)).trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if action_items.is_empty() {
        action_items = vec!["none".to_string()];
    }

    let category_path = string_list(raw.get("category_path"));
    let new_category_suggestion = {
        let suggested = string_list(raw.get("new_category_suggestion"));
        if suggested.is_empty() {
            None
        } else {
            Some(suggested)
        }
    };

    SummaryPayload {
        summary,
        keywords,
        action_items,
        source: model_name.to_string(),
        category_path,
        new_category_suggestion,
    }
}

/// Deterministic payload used when every model attempt failed.
pub fn fallback_payload(text: &str) -> SummaryPayload {
    let normalized: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let summary = if normalized.is_empty() {
        "(empty content)".to_string()
    } else {
        clip_chars(&normalized, SUMMARY_MAX_CHARS)
    };

    let mut keywords: Vec<String> = Vec::new();
    for line in text.lines() {
        let token = line.trim().trim_matches(['。', '.']).to_string();
        if token.is_empty() || keywords.contains(&token) {
            continue;
        }
        keywords.push(token);
        if keywords.len() == KEYWORD_COUNT {
            break;
        }
    }
    while keywords.len() < KEYWORD_COUNT {
        keywords.push("excerpt".to_string());
    }

    SummaryPayload {
        summary,
        keywords,
        action_items: vec!["none".to_string()],
        source: "fallback".to_string(),
        category_path: vec!["uncategorized".to_string()],
        new_category_suggestion: None,
    }
}

fn value_to_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| value_to_text(Some(item)).trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
        Some(Value::String(s)) => {
            let token = s.trim();
            if token.is_empty() {
                Vec::new()
            } else {
                vec![token.to_string()]
            }
        }
        _ => Vec::new(),
    }
}

fn clip_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_clips_and_pads() {
        let long_summary = "x".repeat(120);
        let raw = json!({
            "summary": long_summary,
            "keywords": ["a", "a", "b"],
            "action_items": [],
            "category_path": "Tech",
        });
        let payload = normalize_llm_payload(&raw, "m1");
        assert_eq!(payload.summary.chars().count(), 80);
        assert_eq!(payload.keywords.len(), 5);
        assert_eq!(&payload.keywords[..2], &["a", "b"]);
        assert_eq!(payload.keywords[2], "pending");
        assert_eq!(payload.action_items, vec!["none"]);
        assert_eq!(payload.category_path, vec!["Tech"]);
        assert_eq!(payload.source, "m1");
        assert!(payload.new_category_suggestion.is_none());
    }

    #[test]
    fn test_normalize_handles_missing_fields() {
        let payload = normalize_llm_payload(&json!({}), "m1");
        assert_eq!(payload.summary, "(empty summary)");
        assert_eq!(payload.keywords, vec!["pending"; 5]);
        assert!(payload.category_path.is_empty());
    }

    #[test]
    fn test_normalize_coerces_non_string_values() {
        let raw = json!({
            "summary": 42,
            "keywords": [1, 2],
            "new_category_suggestion": ["New", " "],
        });
        let payload = normalize_llm_payload(&raw, "m1");
        assert_eq!(payload.summary, "42");
        assert_eq!(&payload.keywords[..2], &["1", "2"]);
        assert_eq!(
            payload.new_category_suggestion,
            Some(vec!["New".to_string()])
        );
    }

    #[test]
    fn test_fallback_payload_shape() {
        let payload = fallback_payload("First line.\nSecond line\n\nFirst line.\n");
        assert!(payload.summary.starts_with("First line."));
        assert_eq!(payload.keywords.len(), 5);
        assert_eq!(payload.keywords[0], "First line");
        assert_eq!(payload.keywords[1], "Second line");
        assert_eq!(payload.keywords[2], "excerpt");
        assert_eq!(payload.action_items, vec!["none"]);
        assert_eq!(payload.source, "fallback");
        assert_eq!(payload.category_path, vec!["uncategorized"]);
    }

    #[test]
    fn test_fallback_on_empty_content() {
        let payload = fallback_payload("");
        assert_eq!(payload.summary, "(empty content)");
        assert_eq!(payload.keywords, vec!["excerpt"; 5]);
    }
}
