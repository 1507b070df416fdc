//! Configuration for the token lifecycle manager

use chrono::Duration;
use tf_shared::config::TokenConfig;

/// Lifetime and validation settings used when signing and checking tokens
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Lifetime of a freshly issued token
    pub refresh_window: Duration,
    /// Tolerated clock skew when comparing expiry against now
    pub allowed_skew_seconds: i64,
    /// Keep sub-second precision in `iat` / `exp`
    pub use_sub_second_timestamps: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            refresh_window: Duration::days(7),
            allowed_skew_seconds: 60,
            use_sub_second_timestamps: false,
        }
    }
}

impl LifecycleConfig {
    /// Set the refresh window
    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    /// Set the allowed clock skew
    pub fn with_allowed_skew_seconds(mut self, seconds: i64) -> Self {
        self.allowed_skew_seconds = seconds;
        self
    }

    /// Enable sub-second timestamps
    pub fn with_sub_second_timestamps(mut self, enabled: bool) -> Self {
        self.use_sub_second_timestamps = enabled;
        self
    }
}

impl From<&TokenConfig> for LifecycleConfig {
    /// Windows beyond what `Duration` can hold saturate; signing then fails
    /// with `TokenError::SigningFailed` instead of panicking.
    fn from(config: &TokenConfig) -> Self {
        Self {
            refresh_window: Duration::try_seconds(config.refresh_window_seconds())
                .unwrap_or(Duration::MAX),
            allowed_skew_seconds: config.allowed_skew_seconds,
            use_sub_second_timestamps: config.use_sub_second_timestamps,
        }
    }
}
