//! Multi-model dispatch with fallback
//!
//! A dispatch walks the requested models in order, giving each one
//! attempt under a shared timeout, and returns the first usable answer.
//! Every attempt is appended to `llm_runs.jsonl` whether it succeeded
//! or not. A single model failing is never an error; only an order with
//! no registered model at all is.

use crate::client::{LlmClient, ModelConfig};
use crate::error::{AgentError, Result};
use crate::prompts::NOTE_SUMMARY;
use chrono::Utc;
use notemill_core::entities::AttrMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const LLM_RUNS_FILE: &str = "llm_runs.jsonl";

/// What shape the caller expects the model output in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedFormat {
    Plain,
    Json,
}

impl ExpectedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Json => "json",
        }
    }
}

/// Outcome of one dispatch, successful or exhausted.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub model: String,
    pub content: String,
    /// Present when `ExpectedFormat::Json` was requested and parsing worked.
    pub parsed: Option<Value>,
    pub succeeded: bool,
    pub error: Option<String>,
    pub latency_seconds: f64,
}

#[derive(Serialize)]
struct RunRecord<'a> {
    created_at: chrono::DateTime<Utc>,
    model: &'a str,
    expected_format: &'static str,
    prompt_chars: usize,
    succeeded: bool,
    error: Option<&'a str>,
    latency_seconds: f64,
    metadata: &'a AttrMap,
}

/// Routes prompts across a registry of models with ordered fallback.
pub struct Dispatcher {
    models: BTreeMap<String, ModelConfig>,
    default_model: String,
    client: Arc<dyn LlmClient>,
    attempt_timeout: Duration,
    runs_path: Option<PathBuf>,
}

impl Dispatcher {
    pub fn new(
        models: Vec<ModelConfig>,
        default_model: impl Into<String>,
        client: Arc<dyn LlmClient>,
        attempt_timeout: Duration,
    ) -> Result<Self> {
        let default_model = default_model.into();
        let models: BTreeMap<String, ModelConfig> =
            models.into_iter().map(|m| (m.name.clone(), m)).collect();
        if !models.contains_key(&default_model) {
            return Err(AgentError::NoUsableModel(default_model));
        }
        Ok(Self {
            models,
            default_model,
            client,
            attempt_timeout,
            runs_path: None,
        })
    }

    /// Append each attempt to `<journal_root>/llm_runs.jsonl`.
    pub fn with_run_log(mut self, journal_root: impl Into<PathBuf>) -> Result<Self> {
        let root = journal_root.into();
        fs::create_dir_all(&root)?;
        self.runs_path = Some(root.join(LLM_RUNS_FILE));
        Ok(self)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Try each requested model in order and return the first usable
    /// response. When every attempt fails the returned response carries
    /// `succeeded: false` and the last error; that is not an `Err`.
    pub async fn dispatch(
        &self,
        prompt: &str,
        models: Option<&[String]>,
        expected: ExpectedFormat,
        metadata: AttrMap,
    ) -> Result<LlmResponse> {
        let order: Vec<&str> = match models {
            Some(names) if !names.is_empty() => names.iter().map(String::as_str).collect(),
            _ => vec![self.default_model.as_str()],
        };
        let configs: Vec<&ModelConfig> = order
            .iter()
            .filter_map(|name| {
                let config = self.models.get(*name);
                if config.is_none() {
                    warn!(model = %name, "skipping unregistered model");
                }
                config
            })
            .collect();
        if configs.is_empty() {
            return Err(AgentError::NoUsableModel(order.join(", ")));
        }

        let mut last_error = String::new();
        let mut last_model = String::new();
        for config in configs {
            last_model = config.name.clone();
            let started = tokio::time::Instant::now();
            let attempt = timeout(self.attempt_timeout, self.client.generate(config, prompt)).await;
            let latency = started.elapsed().as_secs_f64();

            let (content, error) = match attempt {
                Ok(Ok(content)) => (Some(content), None),
                Ok(Err(err)) => (None, Some(err.to_string())),
                Err(_) => (
                    None,
                    Some(format!(
                        "timed out after {:.0}s",
                        self.attempt_timeout.as_secs_f64()
                    )),
                ),
            };
            self.log_run(
                &config.name,
                expected,
                prompt.len(),
                content.is_some(),
                error.as_deref(),
                latency,
                &metadata,
            );

            let Some(content) = content else {
                let error = error.unwrap_or_default();
                warn!(model = %config.name, %error, "model attempt failed");
                last_error = error;
                continue;
            };

            let parsed = match expected {
                ExpectedFormat::Plain => None,
                ExpectedFormat::Json => match try_parse_json(&content) {
                    Some(value) => Some(value),
                    None => {
                        let error = "response is not parseable JSON".to_string();
                        warn!(model = %config.name, "JSON extraction failed");
                        self.log_run(
                            &config.name,
                            expected,
                            prompt.len(),
                            false,
                            Some(&error),
                            latency,
                            &metadata,
                        );
                        last_error = error;
                        continue;
                    }
                },
            };

            info!(model = %config.name, latency_seconds = latency, "dispatch succeeded");
            return Ok(LlmResponse {
                model: config.name.clone(),
                content,
                parsed,
                succeeded: true,
                error: None,
                latency_seconds: latency,
            });
        }

        debug!(%last_error, "all models exhausted");
        Ok(LlmResponse {
            model: last_model,
            content: String::new(),
            parsed: None,
            succeeded: false,
            error: Some(if last_error.is_empty() {
                "all models failed".to_string()
            } else {
                last_error
            }),
            latency_seconds: 0.0,
        })
    }

    /// Render and dispatch the note summary prompt.
    pub async fn summarize_note(
        &self,
        title: &str,
        content: &str,
        language: &str,
        models: Option<&[String]>,
        category_guidance: Option<&str>,
    ) -> Result<LlmResponse> {
        let title = if title.trim().is_empty() {
            "Untitled"
        } else {
            title
        };
        let categories = match category_guidance {
            Some(guidance) if !guidance.trim().is_empty() => guidance,
            _ => "(no existing categories)",
        };
        let prompt = NOTE_SUMMARY.render(&[
            ("title", title),
            ("language", language),
            ("categories", categories),
            ("content", content),
        ]);
        let mut metadata = AttrMap::new();
        metadata.insert("task".to_string(), Value::from(NOTE_SUMMARY.name));
        metadata.insert("language".to_string(), Value::from(language));
        self.dispatch(&prompt, models, ExpectedFormat::Json, metadata)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    fn log_run(
        &self,
        model: &str,
        expected: ExpectedFormat,
        prompt_chars: usize,
        succeeded: bool,
        error: Option<&str>,
        latency_seconds: f64,
        metadata: &AttrMap,
    ) {
        let Some(path) = &self.runs_path else {
            return;
        };
        let record = RunRecord {
            created_at: Utc::now(),
            model,
            expected_format: expected.as_str(),
            prompt_chars,
            succeeded,
            error,
            latency_seconds,
            metadata,
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| {
                let line = serde_json::to_string(&record).unwrap_or_default();
                writeln!(file, "{}", line)
            });
        if let Err(err) = result {
            warn!(%err, "failed to append llm run record");
        }
    }
}

/// Extract a JSON document from a model reply.
///
/// Tries, in order: the whole payload; the payload with a surrounding
/// code fence stripped; the innermost balanced-brace block found by
/// scanning opening braces from the end of the text backward.
pub fn try_parse_json(payload: &str) -> Option<Value> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    if let Some(inner) = strip_code_fence(trimmed) {
        if let Some(value) = try_parse_json(inner) {
            return Some(value);
        }
    }
    let open_positions: Vec<usize> = trimmed
        .char_indices()
        .filter(|(_, c)| *c == '{')
        .map(|(i, _)| i)
        .collect();
    for &start in open_positions.iter().rev() {
        if let Some(candidate) = balanced_braces(trimmed, start) {
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Some(value);
            }
        }
    }
    None
}

fn strip_code_fence(payload: &str) -> Option<&str> {
    let rest = payload.strip_prefix("```")?;
    // Drop an optional language tag on the fence line.
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    let end = rest.rfind("```")?;
    Some(rest[..end].trim())
}

/// Slice the balanced `{...}` block starting at `start`, honoring JSON
/// string literals and escapes while counting braces.
fn balanced_braces(payload: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in payload[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&payload[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_direct_json() {
        assert_eq!(try_parse_json(r#"{"a": 1}"#), Some(json!({"a": 1})));
    }

    #[test]
    fn test_parse_fenced_json() {
        let payload = "```json\n{\"summary\": \"ok\"}\n```";
        assert_eq!(try_parse_json(payload), Some(json!({"summary": "ok"})));
    }

    #[test]
    fn test_parse_embedded_json_with_noise() {
        let payload = "Sure, here you go: {\"a\": 1} hope that helps";
        assert_eq!(try_parse_json(payload), Some(json!({"a": 1})));
    }

    #[test]
    fn test_parse_prefers_later_blocks() {
        // The leading block is junk; the later one parses.
        let payload = "{broken {\"b\": 2}";
        assert_eq!(try_parse_json(payload), Some(json!({"b": 2})));
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_the_scanner() {
        let payload = r#"note: {"text": "curly } inside", "n": 3} done"#;
        assert_eq!(
            try_parse_json(payload),
            Some(json!({"text": "curly } inside", "n": 3}))
        );
    }

    #[test]
    fn test_unparseable_payload_is_none() {
        assert_eq!(try_parse_json("no json here"), None);
        assert_eq!(try_parse_json(""), None);
        assert_eq!(try_parse_json("{never closed"), None);
    }
}
