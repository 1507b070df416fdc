//! Token lifecycle module
//!
//! This module handles all refresh-token operations:
//! - Signing key resolution from files or inline material
//! - Signing and verifying compact tokens
//! - Create, get-or-create, refresh and validation of the per-user token
//! - Best-effort batch refresh

mod batch;
mod codec;
mod config;
mod key_source;
mod service;

#[cfg(test)]
mod tests;

pub use batch::{BatchFailure, BatchRefreshReport};
pub use codec::ClaimsCodec;
pub use config::LifecycleConfig;
pub use key_source::{algorithm_name, parse_algorithm, KeyFamily, KeySource, SigningKey};
pub use service::{IssueOptions, OperationOutcome, RecordOperation, TokenLifecycleManager};
