use crate::narrative::NarrativeError;
use crate::rate_limiter::Endpoint;
use serde::Serialize;
use thiserror::Error;

const GENERIC_FAILURE: &str = "An internal error occurred. Please try again later.";

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Missing or invalid caller credentials")]
    Unauthorized,

    #[error("Rate limit exceeded for {endpoint}: retry in {retry_after_secs}s")]
    RateLimited {
        endpoint: Endpoint,
        retry_after_secs: u64,
    },

    #[error("Narrative generator failed: {0}")]
    Upstream(#[from] NarrativeError),

    #[error("{0}")]
    Validation(String),

    #[error("Session not found or access denied")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// What a caller sees when a request fails.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl AuditError {
    /// HTTP-equivalent status code.
    pub fn status(&self) -> u16 {
        match self {
            AuditError::Unauthorized => 401,
            AuditError::RateLimited { .. } => 429,
            AuditError::Upstream(e) => match e {
                NarrativeError::QuotaExhausted => 402,
                NarrativeError::RateLimited => 429,
                _ => 502,
            },
            AuditError::Validation(_) => 400,
            AuditError::NotFound => 404,
            AuditError::Database(_) | AuditError::Serialization(_) | AuditError::Other(_) => 500,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == 500
    }

    /// Convert into the caller-facing shape. Internal failures are logged
    /// here and replaced by a generic message.
    pub fn to_response(&self) -> ErrorResponse {
        let error = match self {
            AuditError::Upstream(NarrativeError::QuotaExhausted) => {
                "Narrative generation quota exhausted. Please try again later.".to_string()
            }
            AuditError::Upstream(NarrativeError::RateLimited) => {
                "Narrative service is busy. Please try again shortly.".to_string()
            }
            AuditError::Upstream(_) => {
                "Narrative service unavailable. Please retry the request.".to_string()
            }
            e if e.is_internal() => {
                log::error!("internal failure: {e}");
                GENERIC_FAILURE.to_string()
            }
            e => e.to_string(),
        };
        let retry_after_secs = match self {
            AuditError::RateLimited { retry_after_secs, .. } => Some(*retry_after_secs),
            _ => None,
        };
        ErrorResponse {
            status: self.status(),
            error,
            retry_after_secs,
        }
    }
}
