//! Batch refresh across many users
//!
//! Each user is rotated independently: one failure is recorded and the
//! rest of the batch carries on.

use tracing::{error, info};

use crate::domain::entities::token::RefreshTokenRecord;
use crate::domain::value_objects::{UserId, UserRef};
use crate::errors::LifecycleError;
use crate::repositories::TokenStore;

use super::service::TokenLifecycleManager;

/// One user whose refresh failed
#[derive(Debug)]
pub struct BatchFailure {
    pub user_id: UserId,
    pub label: String,
    pub error: LifecycleError,
}

/// Result of a batch refresh
#[derive(Debug, Default)]
pub struct BatchRefreshReport {
    /// Number of users refreshed
    pub succeeded: usize,
    /// Records of the refreshed users, in input order
    pub records: Vec<RefreshTokenRecord>,
    /// Users that could not be refreshed
    pub failures: Vec<BatchFailure>,
}

impl BatchRefreshReport {
    /// Number of users that failed
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Check if every user was refreshed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded, self.failed())
    }
}

impl<S: TokenStore> TokenLifecycleManager<S> {
    /// Refreshes the token of every user, best-effort
    ///
    /// Never fails as a whole; per-user errors end up in the report.
    pub async fn batch_refresh(&self, users: &[UserRef]) -> BatchRefreshReport {
        info!(count = users.len(), "Starting batch refresh");

        let mut report = BatchRefreshReport::default();

        for user in users {
            match self.refresh(user).await {
                Ok(record) => {
                    report.succeeded += 1;
                    report.records.push(record);
                }
                Err(e) => {
                    error!(user_id = %user.id, error = %e, "Failed to refresh token");
                    report.failures.push(BatchFailure {
                        user_id: user.id.clone(),
                        label: user.label.clone(),
                        error: e,
                    });
                }
            }
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed(),
            "Batch refresh completed"
        );

        report
    }
}
