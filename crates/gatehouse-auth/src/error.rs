//! Authentication and session error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the identity and session collaborators.
///
/// None of these are fatal to request processing: every consumer in this
/// crate degrades to an anonymous, denied, or empty result and logs the
/// failure instead of raising it past the core.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// Upstream principal lookup failed
    #[error("Principal lookup error: {message}")]
    LookupError { message: String },

    /// Authority-grant query failed
    #[error("Authority source error: {message}")]
    AuthorityError { message: String },

    /// Persisted state could not be (de)serialized
    #[error("Serialization error: {message}")]
    SerializationError { message: String },

    /// Attempt ledger append or count failed
    #[error("Attempt ledger error: {message}")]
    LedgerError { message: String },
}

impl AuthError {
    /// Get the error code for log aggregation
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::LookupError { .. } => "LOOKUP_ERROR",
            AuthError::AuthorityError { .. } => "AUTHORITY_ERROR",
            AuthError::SerializationError { .. } => "SERIALIZATION_ERROR",
            AuthError::LedgerError { .. } => "LEDGER_ERROR",
        }
    }

    /// Create a principal lookup error
    pub fn lookup_error(message: impl Into<String>) -> Self {
        Self::LookupError {
            message: message.into(),
        }
    }

    /// Create an authority source error
    pub fn authority_error(message: impl Into<String>) -> Self {
        Self::AuthorityError {
            message: message.into(),
        }
    }

    /// Create a ledger error
    pub fn ledger_error(message: impl Into<String>) -> Self {
        Self::LedgerError {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            message: err.to_string(),
        }
    }
}
