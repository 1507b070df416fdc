//! Shared configuration and logging for TokenFlow
//!
//! This crate provides functionality used across all workspace members:
//! - Configuration types for key material, token lifetimes and storage
//! - Configuration loading from files and environment variables
//! - Tracing subscriber initialisation for binaries

pub mod config;
pub mod errors;
pub mod logging;

// Re-export commonly used items at crate root
pub use config::{
    DatabaseConfig, Environment, KeyConfig, KeyFormat, KeyMaterial, LogFormat, LoggingConfig,
    TokenConfig, TokenFlowConfig,
};
pub use errors::ConfigError;
