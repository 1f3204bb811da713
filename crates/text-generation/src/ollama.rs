//! Local Ollama generator.
//!
//! Calls `/api/generate` with streaming disabled. When the configured model
//! is not installed, optionally retries once with the first model listed by
//! `/api/tags`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GenerationError, GenerationResult};
use crate::provider::{ensure_success, http_client, non_empty, TextGenerator};

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: Option<String>,
}

pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    fallback_to_first_tag: bool,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            model: model.trim().to_string(),
            fallback_to_first_tag: true,
        }
    }

    pub fn with_tag_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_first_tag = enabled;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate_with(&self, model: &str, prompt: &str) -> GenerationResult<String> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;
        let body: GenerateResponse = ensure_success(response).await?.json().await?;

        if let Some(err) = body.error {
            return Err(GenerationError::ServiceUnavailable(err));
        }
        non_empty(body.response.as_deref(), "ollama response")
    }

    /// Installed model names, in the order Ollama reports them
    pub async fn installed_models(&self) -> GenerationResult<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        let tags: TagsResponse = ensure_success(response).await?.json().await?;

        Ok(tags
            .models
            .into_iter()
            .filter_map(|m| m.name)
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect())
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        let first = match self.generate_with(&self.model, prompt).await {
            Ok(text) => return Ok(text),
            Err(e) => e,
        };
        if !self.fallback_to_first_tag {
            return Err(first);
        }

        let installed = match self.installed_models().await {
            Ok(models) => models,
            Err(e) => {
                tracing::debug!(error = %e, "Unable to list Ollama models");
                return Err(first);
            }
        };

        // Only retry when the configured model is really missing.
        match installed.first() {
            Some(fallback) if !installed.contains(&self.model) => {
                tracing::debug!(
                    configured = %self.model,
                    fallback = %fallback,
                    "Configured Ollama model not installed, retrying"
                );
                self.generate_with(fallback, prompt).await
            }
            _ => Err(first),
        }
    }
}
