//! Configuration module
//!
//! - `auth` - Signing key source and token lifetime configuration
//! - `database` - SQL token store connection configuration
//! - `environment` - Environment detection and logging configuration

pub mod auth;
pub mod database;
pub mod environment;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::ConfigError;

// Re-export commonly used types
pub use auth::{KeyConfig, KeyFormat, KeyMaterial, TokenConfig, MAX_REFRESH_WINDOW_DAYS};
pub use database::DatabaseConfig;
pub use environment::{Environment, LogFormat, LoggingConfig};

/// Complete configuration combining all sub-configurations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TokenFlowConfig {
    /// Environment configuration
    #[serde(default)]
    pub environment: Environment,

    /// Signing key configuration
    #[serde(default)]
    pub key: KeyConfig,

    /// Token lifetime configuration
    #[serde(default)]
    pub token: TokenConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TokenFlowConfig {
    /// Load configuration from environment variables
    ///
    /// A `.env` file for the detected environment is read first when present,
    /// followed by a plain `.env`. The result is validated like a loaded file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();
        dotenvy::from_filename(environment.env_file()).ok();
        dotenvy::dotenv().ok();

        let config = Self {
            environment,
            key: KeyConfig::from_env(),
            token: TokenConfig::from_env(),
            database: DatabaseConfig::from_env(),
            logging: LoggingConfig::for_environment(environment),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, overridden by `TOKENFLOW__*` variables
    ///
    /// Nested keys use a double underscore, e.g.
    /// `TOKENFLOW__TOKEN__ALLOWED_SKEW_SECONDS=30`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(true))
            .add_source(
                config::Environment::with_prefix("TOKENFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let parsed: Self = settings.try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject values the lifecycle manager cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let days = self.token.refresh_window_days;
        if days <= 0 || days > MAX_REFRESH_WINDOW_DAYS {
            return Err(ConfigError::InvalidValue {
                field: "token.refresh_window_days".to_string(),
                message: format!(
                    "must be between 1 and {}, got {}",
                    MAX_REFRESH_WINDOW_DAYS, days
                ),
            });
        }
        if self.token.allowed_skew_seconds < 0 {
            return Err(ConfigError::InvalidValue {
                field: "token.allowed_skew_seconds".to_string(),
                message: format!("must not be negative, got {}", self.token.allowed_skew_seconds),
            });
        }
        Ok(())
    }
}
