use risk_core::RiskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("No text generator configured")]
    NoProviders,
}

impl From<GenerationError> for RiskError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Timeout(secs) => RiskError::Timeout(secs),
            other => RiskError::ExternalService(other.to_string()),
        }
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;
