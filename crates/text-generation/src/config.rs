use std::sync::Arc;
use std::time::Duration;

use crate::chain::ProviderChain;
use crate::ollama::{OllamaGenerator, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use crate::openai::{OpenAiCompatibleGenerator, DEFAULT_API_BASE, DEFAULT_API_MODEL};
use crate::provider::TextGenerator;

pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Provider chain configuration, read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub enabled: bool,
    pub timeout: Duration,
    pub use_ollama: bool,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub ollama_fallback_to_first_tag: bool,
    /// Hosted fallback is skipped without a key
    pub api_key: Option<String>,
    pub api_model: String,
    pub api_base: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            use_ollama: true,
            ollama_base_url: DEFAULT_OLLAMA_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_fallback_to_first_tag: true,
            api_key: None,
            api_model: DEFAULT_API_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// "0", "false" and "no" switch a flag off; anything else keeps it on.
fn flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"),
        None => default,
    }
}

fn text(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl GenerationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let timeout_secs = lookup("LLM_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            enabled: flag(lookup("LLM_ENABLED"), true),
            timeout: Duration::from_secs(timeout_secs),
            use_ollama: flag(lookup("LLM_USE_OLLAMA"), true),
            ollama_base_url: text(lookup("OLLAMA_BASE_URL"), DEFAULT_OLLAMA_URL),
            ollama_model: text(lookup("OLLAMA_MODEL"), DEFAULT_OLLAMA_MODEL),
            ollama_fallback_to_first_tag: flag(lookup("OLLAMA_FALLBACK_TO_FIRST_TAG"), true),
            api_key: lookup("LLM_API_KEY")
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            api_model: text(lookup("LLM_MODEL"), DEFAULT_API_MODEL),
            api_base: text(lookup("LLM_API_BASE"), DEFAULT_API_BASE),
        }
    }

    /// Build the chain, or `None` when generation is off or nothing is usable.
    pub fn build_chain(&self) -> Option<ProviderChain> {
        if !self.enabled {
            return None;
        }

        let mut providers: Vec<Arc<dyn TextGenerator>> = Vec::new();
        if self.use_ollama {
            providers.push(Arc::new(
                OllamaGenerator::new(&self.ollama_base_url, &self.ollama_model, self.timeout)
                    .with_tag_fallback(self.ollama_fallback_to_first_tag),
            ));
        }
        if let Some(key) = &self.api_key {
            providers.push(Arc::new(OpenAiCompatibleGenerator::new(
                &self.api_base,
                key,
                &self.api_model,
                self.timeout,
            )));
        }

        if providers.is_empty() {
            return None;
        }
        let chain = ProviderChain::new(providers, self.timeout);
        tracing::info!(providers = ?chain.provider_names(), timeout_secs = self.timeout.as_secs(), "Text generation enabled");
        Some(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> GenerationConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GenerationConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg, GenerationConfig::default());
        assert_eq!(cfg.timeout, Duration::from_secs(20));

        let chain = cfg.build_chain().unwrap();
        assert_eq!(chain.provider_names(), vec!["ollama"]);
    }

    #[test]
    fn test_hosted_fallback_needs_key() {
        let cfg = config(&[("LLM_API_KEY", "  sk-1 "), ("LLM_API_BASE", "http://gw/v1/")]);
        assert_eq!(cfg.api_key.as_deref(), Some("sk-1"));
        let chain = cfg.build_chain().unwrap();
        assert_eq!(chain.provider_names(), vec!["ollama", "openai-compatible"]);

        let only_hosted = config(&[("LLM_USE_OLLAMA", "no"), ("LLM_API_KEY", "sk-1")]);
        assert_eq!(
            only_hosted.build_chain().unwrap().provider_names(),
            vec!["openai-compatible"]
        );
    }

    #[test]
    fn test_disabled_or_empty_chain() {
        assert!(config(&[("LLM_ENABLED", "false")]).build_chain().is_none());
        assert!(config(&[("LLM_USE_OLLAMA", "0")]).build_chain().is_none());
    }

    #[test]
    fn test_bad_timeout_falls_back_to_default() {
        assert_eq!(config(&[("LLM_TIMEOUT_SECS", "abc")]).timeout.as_secs(), 20);
        assert_eq!(config(&[("LLM_TIMEOUT_SECS", "0")]).timeout.as_secs(), 20);
        assert_eq!(config(&[("LLM_TIMEOUT_SECS", "6")]).timeout.as_secs(), 6);
    }
}
