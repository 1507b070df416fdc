//! Database module - MySQL implementations using SQLx
//!
//! This module provides:
//! - Connection pool management and the bundled schema migration
//! - The MySQL `TokenStore` implementation

pub mod connection;
pub mod mysql;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use connection::{DatabasePool, PoolStatistics};
pub use mysql::MySqlTokenStore;
