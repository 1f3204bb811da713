use std::sync::Arc;
use std::time::Duration;

use crate::error::{GenerationError, GenerationResult};
use crate::provider::TextGenerator;

/// Ordered list of generators tried one after another under a single
/// deadline. First non-empty answer wins.
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn TextGenerator>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the chain, surfacing the last provider error or the timeout.
    pub async fn try_generate(&self, prompt: &str) -> GenerationResult<String> {
        if self.providers.is_empty() {
            return Err(GenerationError::NoProviders);
        }

        match tokio::time::timeout(self.timeout, self.run(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.timeout.as_secs())),
        }
    }

    /// Like `try_generate`, but failures are logged and become `None`.
    pub async fn generate(&self, prompt: &str) -> Option<String> {
        match self.try_generate(prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "Text generation unavailable, using template");
                None
            }
        }
    }

    async fn run(&self, prompt: &str) -> GenerationResult<String> {
        let mut last_error = GenerationError::NoProviders;
        for provider in &self.providers {
            match provider.generate(prompt).await {
                Ok(text) => {
                    tracing::debug!(provider = provider.name(), "Text generated");
                    return Ok(text);
                }
                Err(e) => {
                    tracing::debug!(provider = provider.name(), error = %e, "Text generator failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

impl std::fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderChain")
            .field("providers", &self.provider_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(name: &'static str, reply: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(&self, _prompt: &str) -> GenerationResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .ok_or_else(|| GenerationError::ServiceUnavailable(self.name.to_string()))
        }
    }

    struct Slow;

    #[async_trait]
    impl TextGenerator for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _prompt: &str) -> GenerationResult<String> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let a = Fixed::new("a", None);
        let b = Fixed::new("b", Some("from b"));
        let c = Fixed::new("c", Some("from c"));
        let providers: Vec<Arc<dyn TextGenerator>> = vec![a.clone(), b.clone(), c.clone()];
        let chain = ProviderChain::new(providers, Duration::from_secs(1));

        assert_eq!(chain.generate("p").await.as_deref(), Some("from b"));
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(c.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failing_yields_none() {
        let providers: Vec<Arc<dyn TextGenerator>> = vec![Fixed::new("a", None), Fixed::new("b", None)];
        let chain = ProviderChain::new(providers, Duration::from_secs(1));
        let err = chain.try_generate("p").await.unwrap_err();
        assert!(err.to_string().ends_with(": b"));
        assert!(chain.generate("p").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_covers_whole_chain() {
        let providers: Vec<Arc<dyn TextGenerator>> =
            vec![Arc::new(Slow) as Arc<dyn TextGenerator>, Fixed::new("never", Some("x"))];
        let chain = ProviderChain::new(providers, Duration::from_secs(20));
        let err = chain.try_generate("p").await.unwrap_err();
        assert!(matches!(err, GenerationError::Timeout(20)));
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let chain = ProviderChain::new(Vec::new(), Duration::from_secs(1));
        assert!(chain.is_empty());
        assert!(matches!(
            chain.try_generate("p").await,
            Err(GenerationError::NoProviders)
        ));
    }
}
