//! LLM backend abstraction
//!
//! The dispatcher talks to backends through the `LlmClient` trait so
//! tests can script responses. The one production implementation speaks
//! the Ollama generate API.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Declarative description of one backend model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub provider: Provider,
    /// Provider-specific generation options, passed through verbatim.
    pub options: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Ollama,
}

impl ModelConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: Provider::Ollama,
            options: None,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// A text-generation backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, model: &ModelConfig, prompt: &str) -> Result<String>;
}

/// HTTP client for a local Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a Value>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Reads `NOTEMILL_OLLAMA_URL`, falling back to the local default.
    pub fn from_env() -> Self {
        let base_url = std::env::var("NOTEMILL_OLLAMA_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());
        Self::new(base_url)
    }

    pub async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, model: &ModelConfig, prompt: &str) -> Result<String> {
        debug!(model = %model.name, prompt_len = prompt.len(), "calling ollama");
        let request = GenerateRequest {
            model: &model.name,
            prompt,
            stream: false,
            options: model.options.as_ref(),
        };
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }
}
