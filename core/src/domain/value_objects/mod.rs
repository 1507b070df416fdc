//! Value objects representing immutable domain concepts.

pub mod user;

// Re-export commonly used types
pub use user::{UserId, UserRef};
