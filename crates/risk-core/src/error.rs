use thiserror::Error;

use crate::types::BusinessId;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Business {0} not found")]
    NotFound(BusinessId),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Failed to load risk model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl RiskError {
    pub fn model_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        RiskError::ModelLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Errors that a caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RiskError::Validation(_) | RiskError::NotFound(_) | RiskError::Conflict(_)
        )
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for RiskError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RiskError::Conflict(db.message().to_string())
            }
            _ => RiskError::Storage(err.to_string()),
        }
    }
}

pub type RiskResult<T> = Result<T, RiskError>;
