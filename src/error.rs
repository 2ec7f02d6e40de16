//! Error taxonomy for all store operations.
//!
//! Validation errors ([`EngramError::InvalidArgument`],
//! [`EngramError::PreconditionFailed`]) are raised before any mutation, so
//! every write is all-or-nothing. [`EngramError::Storage`] wraps durable-write
//! failures and is always surfaced to the caller. [`EngramError::EmbeddingUnavailable`]
//! is recoverable — recall degrades to the remaining tiers instead of failing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngramError {
    /// The referenced record does not exist or is already purged.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// A state-machine or referential precondition was not met.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// An enum value or field failed validation before any mutation.
    #[error("invalid {field}: {value}")]
    InvalidArgument { field: &'static str, value: String },

    /// A durable read/write failed. Never swallowed — risks data loss.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The embedding endpoint failed or is not configured.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngramError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngramError>;
