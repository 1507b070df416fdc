//! # TokenFlow Core
//!
//! Lifecycle management for signed refresh tokens bound to a single user
//! identity. This crate contains the domain entities, the error taxonomy,
//! the storage contract with an in-memory implementation, and the services
//! that resolve keys, sign and verify claims, and rotate tokens.

pub mod domain;
pub mod errors;
pub mod repositories;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::*;
pub use errors::*;
pub use repositories::*;
pub use services::*;
