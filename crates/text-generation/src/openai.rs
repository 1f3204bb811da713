//! Hosted OpenAI-compatible generator.
//!
//! Tries the Responses API first and falls back to Chat Completions on the
//! same base URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::GenerationResult;
use crate::provider::{ensure_success, http_client, non_empty, TextGenerator, SYSTEM_PROMPT};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_API_MODEL: &str = "gpt-4o-mini";

const TEMPERATURE: f64 = 0.2;
const MAX_TOKENS: u32 = 280;

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<Message<'a>>,
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatibleGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleGenerator {
    pub fn new(api_base: &str, api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: model.trim().to_string(),
        }
    }

    fn messages<'a>(prompt: &'a str) -> Vec<Message<'a>> {
        vec![
            Message {
                role: "system",
                content: SYSTEM_PROMPT,
            },
            Message {
                role: "user",
                content: prompt,
            },
        ]
    }

    async fn via_responses(&self, prompt: &str) -> GenerationResult<String> {
        let request = ResponsesRequest {
            model: &self.model,
            input: Self::messages(prompt),
            temperature: TEMPERATURE,
            max_output_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/responses", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: Value = ensure_success(response).await?.json().await?;

        non_empty(responses_text(&body).as_deref(), "responses output")
    }

    async fn via_chat(&self, prompt: &str) -> GenerationResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: Self::messages(prompt),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let body: ChatResponse = ensure_success(response).await?.json().await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content);
        non_empty(content.as_deref(), "chat completion")
    }
}

/// `output_text` when the server flattens it, else the concatenated
/// `output[].content[]` text parts.
fn responses_text(body: &Value) -> Option<String> {
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    let parts: Vec<&str> = body
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(""))
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatibleGenerator {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn generate(&self, prompt: &str) -> GenerationResult<String> {
        match self.via_responses(prompt).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::debug!(error = %e, "Responses API failed, trying chat completions");
                self.via_chat(prompt).await
            }
        }
    }
}
