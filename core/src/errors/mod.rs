//! Domain-specific error types and error handling.

mod types;


// Re-export all error types
pub use types::{KeyError, StoreError, TokenError};

use thiserror::Error;

/// Errors returned by the token lifecycle manager
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("A refresh token for {label} already exists")]
    AlreadyExists { label: String },

    #[error("Operation '{operation}' is not allowed on refresh tokens; use refresh to rotate the token")]
    DisallowedOperation { operation: String },

    // Bridge to specific error types
    #[error(transparent)]
    Configuration(#[from] KeyError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl LifecycleError {
    /// Whether the error is a token validation outcome rather than a failure
    pub fn is_validation_outcome(&self) -> bool {
        matches!(self, LifecycleError::Token(e) if e.is_validation_outcome())
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
