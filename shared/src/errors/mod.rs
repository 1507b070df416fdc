//! Errors raised while loading configuration

use thiserror::Error;

/// Failure to assemble a [`crate::TokenFlowConfig`]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Failed to initialise logging: {message}")]
    Logging { message: String },
}
