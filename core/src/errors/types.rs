//! Error types for key resolution, token handling and storage
//!
//! The three enums here are bridged into [`super::LifecycleError`], which is
//! what the lifecycle manager returns to callers.

use std::path::PathBuf;
use thiserror::Error;

use crate::domain::value_objects::UserId;

/// Key configuration and resolution errors
///
/// All of these are fatal configuration problems and are never retried.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("No signing key configured: set a key file path or inline key material")]
    KeyNotConfigured,

    #[error("Key file not found: {}", path.display())]
    KeyFileNotFound { path: PathBuf },

    #[error("Key file {} could not be read: {message}", path.display())]
    KeyFileUnreadable { path: PathBuf, message: String },

    #[error("Unsupported key file type '{extension}' for {}", path.display())]
    UnsupportedKeyFileType { path: PathBuf, extension: String },

    #[error("Invalid key format: {message}")]
    InvalidKeyFormat { message: String },

    #[error("Unsupported signature algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
}

impl KeyError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        KeyError::InvalidKeyFormat {
            message: message.into(),
        }
    }
}

/// Token issuance and verification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token: {reason}")]
    MalformedToken { reason: String },

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Token subject {found} does not match record owner {expected}")]
    SubjectMismatch { expected: String, found: String },

    #[error("Explicit expiry must lie in the future")]
    ExpiryNotInFuture,

    #[error("Token signing failed: {message}")]
    SigningFailed { message: String },
}

impl TokenError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        TokenError::MalformedToken {
            reason: reason.into(),
        }
    }

    /// Whether this error only says "this token is not valid right now"
    ///
    /// Validation outcomes are collapsed to `false` by
    /// `TokenLifecycleManager::is_valid`; everything else propagates.
    pub fn is_validation_outcome(&self) -> bool {
        matches!(
            self,
            TokenError::MalformedToken { .. }
                | TokenError::InvalidSignature
                | TokenError::ExpiredToken
                | TokenError::SubjectMismatch { .. }
        )
    }
}

/// Errors reported by a token store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("A token record for user {user_id} already exists")]
    DuplicateKey { user_id: UserId },

    #[error("No token record for user {user_id}")]
    NotFound { user_id: UserId },

    #[error("Storage backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    /// Wraps a backend failure
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }
}
