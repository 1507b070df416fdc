//! Signing key and token lifetime configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Declared encoding of inline key material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// PEM text (`-----BEGIN ...-----` blocks)
    Pem,
    /// JSON Web Key document as text
    Json,
    /// JSON Web Key members given directly as a mapping
    Structured,
}

impl Default for KeyFormat {
    fn default() -> Self {
        KeyFormat::Json
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyFormat::Pem => write!(f, "pem"),
            KeyFormat::Json => write!(f, "json"),
            KeyFormat::Structured => write!(f, "structured"),
        }
    }
}

impl FromStr for KeyFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pem" => Ok(KeyFormat::Pem),
            "json" | "jwk" => Ok(KeyFormat::Json),
            "structured" | "dict" | "mapping" => Ok(KeyFormat::Structured),
            _ => Err(format!("Invalid key format: {}", s)),
        }
    }
}

/// Inline key material as it appears in configuration
///
/// PEM and JSON material is text; structured material is a mapping of
/// JSON Web Key members.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum KeyMaterial {
    Text(String),
    Mapping(serde_json::Map<String, serde_json::Value>),
}

impl KeyMaterial {
    /// Text view of the material, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeyMaterial::Text(text) => Some(text),
            KeyMaterial::Mapping(_) => None,
        }
    }

    /// Mapping view of the material, if it is a mapping
    pub fn as_mapping(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            KeyMaterial::Text(_) => None,
            KeyMaterial::Mapping(map) => Some(map),
        }
    }
}

// Key material must never end up in logs.
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Text(_) => f.write_str("KeyMaterial::Text(<redacted>)"),
            KeyMaterial::Mapping(map) => f
                .debug_struct("KeyMaterial::Mapping")
                .field("members", &map.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl From<&str> for KeyMaterial {
    fn from(text: &str) -> Self {
        KeyMaterial::Text(text.to_string())
    }
}

impl From<String> for KeyMaterial {
    fn from(text: String) -> Self {
        KeyMaterial::Text(text)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for KeyMaterial {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        KeyMaterial::Mapping(map)
    }
}

/// Where the signing key comes from and which algorithm it signs with
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyConfig {
    /// Path to a key file; takes precedence over inline material
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Inline key material
    #[serde(default)]
    pub material: Option<KeyMaterial>,

    /// Encoding of the inline material
    #[serde(default)]
    pub format: KeyFormat,

    /// Signature algorithm identifier (HS256, EdDSA, RS256, ...)
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Resolve the key once per process instead of on every operation
    #[serde(default = "default_cache_resolved_key")]
    pub cache_resolved_key: bool,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            material: None,
            format: KeyFormat::default(),
            algorithm: default_algorithm(),
            cache_resolved_key: default_cache_resolved_key(),
        }
    }
}

impl KeyConfig {
    /// Key read from a file; the extension selects the decoder
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Key given inline in the declared format
    pub fn inline(material: impl Into<KeyMaterial>, format: KeyFormat) -> Self {
        Self {
            material: Some(material.into()),
            format,
            ..Default::default()
        }
    }

    /// Set the signature algorithm
    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Enable or disable per-process key caching
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache_resolved_key = cache;
        self
    }

    /// Whether any key source is configured at all
    pub fn is_configured(&self) -> bool {
        self.file_path.is_some() || self.material.is_some()
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        let file_path = std::env::var("TOKENFLOW_KEY_FILE").ok().map(PathBuf::from);
        let material = std::env::var("TOKENFLOW_KEY_MATERIAL").ok().map(KeyMaterial::Text);
        let format = std::env::var("TOKENFLOW_KEY_FORMAT")
            .ok()
            .and_then(|f| f.parse().ok())
            .unwrap_or_default();
        let algorithm = std::env::var("TOKENFLOW_SIGNATURE_ALGORITHM")
            .unwrap_or_else(|_| default_algorithm());
        let cache_resolved_key = std::env::var("TOKENFLOW_CACHE_KEY")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        Self {
            file_path,
            material,
            format,
            algorithm,
            cache_resolved_key,
        }
    }
}

/// Longest refresh window accepted by [`crate::TokenFlowConfig::validate`]
pub const MAX_REFRESH_WINDOW_DAYS: i64 = 3650;

/// Token lifetime and validation tolerances
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Lifetime of a freshly issued refresh token in days
    #[serde(default = "default_refresh_window_days")]
    pub refresh_window_days: i64,

    /// Clock skew tolerated when comparing expiry against now
    #[serde(default = "default_allowed_skew_seconds")]
    pub allowed_skew_seconds: i64,

    /// Keep sub-second precision in `iat` / `exp`
    #[serde(default)]
    pub use_sub_second_timestamps: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_window_days: default_refresh_window_days(),
            allowed_skew_seconds: default_allowed_skew_seconds(),
            use_sub_second_timestamps: false,
        }
    }
}

impl TokenConfig {
    /// Set the refresh window in days
    pub fn with_refresh_window_days(mut self, days: i64) -> Self {
        self.refresh_window_days = days;
        self
    }

    /// Set the allowed clock skew in seconds
    pub fn with_allowed_skew_seconds(mut self, seconds: i64) -> Self {
        self.allowed_skew_seconds = seconds;
        self
    }

    /// Enable sub-second timestamps
    pub fn with_sub_second_timestamps(mut self, enabled: bool) -> Self {
        self.use_sub_second_timestamps = enabled;
        self
    }

    /// Refresh window in seconds, saturating at `i64::MAX`
    pub fn refresh_window_seconds(&self) -> i64 {
        self.refresh_window_days.saturating_mul(86400)
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        let refresh_window_days = std::env::var("TOKENFLOW_REFRESH_WINDOW_DAYS")
            .unwrap_or_else(|_| default_refresh_window_days().to_string())
            .parse()
            .unwrap_or_else(|_| default_refresh_window_days());
        let allowed_skew_seconds = std::env::var("TOKENFLOW_ALLOWED_SKEW_SECONDS")
            .unwrap_or_else(|_| default_allowed_skew_seconds().to_string())
            .parse()
            .unwrap_or_else(|_| default_allowed_skew_seconds());
        let use_sub_second_timestamps = std::env::var("TOKENFLOW_SUB_SECOND_TIMESTAMPS")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        Self {
            refresh_window_days,
            allowed_skew_seconds,
            use_sub_second_timestamps,
        }
    }
}

fn default_algorithm() -> String {
    String::from("HS256")
}

fn default_cache_resolved_key() -> bool {
    true
}

fn default_refresh_window_days() -> i64 {
    7
}

fn default_allowed_skew_seconds() -> i64 {
    60
}
