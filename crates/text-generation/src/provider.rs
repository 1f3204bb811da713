use async_trait::async_trait;
use std::time::Duration;

use crate::error::{GenerationError, GenerationResult};

/// System prompt used by chat-style providers
pub const SYSTEM_PROMPT: &str = "You are a concise financial risk assistant.";

/// A single free-text generation backend.
///
/// `generate` returns the trimmed, non-empty completion or an error; it never
/// returns an empty string.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> GenerationResult<String>;
}

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Non-empty trimmed text, or `InvalidResponse`
pub(crate) fn non_empty(text: Option<&str>, what: &str) -> GenerationResult<String> {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => Err(GenerationError::InvalidResponse(format!("{} carried no text", what))),
    }
}

/// Turn a non-2xx response into `ServiceUnavailable`, keeping the body's
/// `error` field when there is one.
pub(crate) async fn ensure_success(response: reqwest::Response) -> GenerationResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| match v.get("error") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Object(o)) => o
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
            _ => None,
        })
        .unwrap_or(body);

    Err(GenerationError::ServiceUnavailable(format!(
        "Status: {} {}",
        status,
        detail.trim()
    )))
}
