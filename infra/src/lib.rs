//! # Infrastructure Layer
//!
//! Concrete collaborators for the token lifecycle core:
//! - **Database**: MySQL connection pool and a `TokenStore` backed by a
//!   table with a unique key on `user_id`
//! - **token_admin**: operator binary for batch refresh and token inspection

// Re-export core types for convenience
pub use tf_core::errors::*;

/// Database module - MySQL implementations using SQLx
pub mod database;

pub use database::{DatabasePool, MySqlTokenStore, PoolStatistics};

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Database connection error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
