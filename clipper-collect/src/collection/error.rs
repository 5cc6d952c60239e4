//! Collection engine error taxonomy
//!
//! Tagged by kind so callers branch on retryability without string
//! matching: validation/conflict/state errors are never retried, transient
//! gateway failures feed the backoff machinery.

use crate::db::RepoError;
use crate::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectionError {
    /// Bad input or configuration (missing instrument, non-positive
    /// amount, unsupported method). Surfaces immediately, never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Double-collection guard: a referenced ledger row is already
    /// collected or claimed by a live collection
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation not valid for the record's current status
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Attempt budget exhausted; requires manual intervention
    #[error("retry limit exceeded for collection {0}")]
    RetryLimitExceeded(i64),

    /// Rail-side transient failure, retried with exponential backoff
    #[error("transient gateway error: {0}")]
    GatewayTransient(String),

    /// Rail refused the debit; terminal without operator action
    #[error("gateway declined: {0}")]
    GatewayDeclined(String),

    #[error("database error: {0}")]
    Database(String),
}

impl CollectionError {
    /// Whether the backoff machinery should schedule another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayTransient(_))
    }
}

impl From<RepoError> for CollectionError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => Self::NotFound(msg),
            RepoError::Duplicate(msg) => Self::Conflict(msg),
            RepoError::Validation(msg) => Self::Validation(msg),
            RepoError::Database(msg) => Self::Database(msg),
        }
    }
}

impl From<GatewayError> for CollectionError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transient(msg) => Self::GatewayTransient(msg),
            GatewayError::Declined(msg) => Self::GatewayDeclined(msg),
            GatewayError::InvalidInstrument(msg) => Self::Validation(msg),
        }
    }
}

pub type CollectionResult<T> = Result<T, CollectionError>;
