//! Error types for the evaluation lifecycle and the case classifier boundary.
//!
//! `ClassifierError` lives here rather than in `entrust-classifier` so the
//! evaluation service can classify failures for retry decisions without
//! string matching.

use thiserror::Error;
use uuid::Uuid;

use crate::model::Party;

/// Errors returned by lifecycle operations and the evaluation store.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// Malformed input at create or submit time. Nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The acting party already submitted their sub-record.
    #[error("{party} assessment for evaluation {evaluation_id} was already submitted")]
    AlreadySubmitted { evaluation_id: Uuid, party: Party },

    /// A referenced EPA, actor or evaluation does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The case classifier could not produce a usable answer.
    #[error("case classification failed: {0}")]
    Classifier(#[from] ClassifierError),

    /// The backing store failed to complete the operation.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl EvaluationError {
    pub fn validation(message: impl Into<String>) -> Self {
        EvaluationError::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        EvaluationError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Returns `true` for errors the caller should resolve by refreshing
    /// its view of the record rather than retrying the write.
    pub fn is_stale_write(&self) -> bool {
        matches!(self, EvaluationError::AlreadySubmitted { .. })
    }
}

/// Errors that can occur when calling the external case classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The service returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The service returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The response could not be read as a classification.
    #[error("malformed classification: {0}")]
    Malformed(String),

    /// The classifier answered but matched no candidate EPA.
    #[error("no matching EPA: {0}")]
    NoMatch(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ClassifierError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ClassifierError::AuthenticationFailed(_)
                | ClassifierError::Malformed(_)
                | ClassifierError::NoMatch(_)
        )
    }

    /// Returns the retry-after delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ClassifierError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
