//! Business services containing the token lifecycle logic.

pub mod token;

// Re-export commonly used types
pub use token::{
    BatchFailure, BatchRefreshReport, ClaimsCodec, IssueOptions, KeyFamily, KeySource,
    LifecycleConfig, OperationOutcome, RecordOperation, SigningKey, TokenLifecycleManager,
};
