//! Free-text generation for risk explanations.
//!
//! A [`ProviderChain`] tries a local Ollama model first and an
//! OpenAI-compatible hosted API second, under one deadline. Callers only
//! ever see `Some(text)` or `None`.

pub mod chain;
pub mod config;
pub mod error;
pub mod ollama;
pub mod openai;
pub mod provider;

pub use chain::ProviderChain;
pub use config::GenerationConfig;
pub use error::{GenerationError, GenerationResult};
pub use ollama::OllamaGenerator;
pub use openai::OpenAiCompatibleGenerator;
pub use provider::TextGenerator;
