//! Token entities: claims, header and the stored refresh token record.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::domain::value_objects::UserId;

/// Claim names the codec always computes itself
pub const RESERVED_CLAIMS: [&str; 4] = ["uid", "iat", "exp", "jti"];

/// Value of the `typ` header
pub const TOKEN_TYPE: &str = "JWT";

// Largest integer an f64 represents exactly.
const MAX_EXACT_SECONDS: f64 = 9_007_199_254_740_992.0;

/// Unix timestamp in seconds, whole or with sub-second precision
///
/// Whole values serialize as JSON integers, fractional values as floats,
/// so whole-second deployments produce the familiar integer `iat` / `exp`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct NumericDate(f64);

impl NumericDate {
    /// Timestamp from whole seconds
    pub fn from_seconds(seconds: i64) -> Self {
        Self(seconds as f64)
    }

    /// Timestamp from a datetime, truncated to whole seconds unless `sub_second`
    pub fn from_datetime(at: DateTime<Utc>, sub_second: bool) -> Self {
        if sub_second {
            Self(at.timestamp_micros() as f64 / 1_000_000.0)
        } else {
            Self(at.timestamp() as f64)
        }
    }

    /// Seconds since the epoch
    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Timestamp shifted by `seconds`
    pub fn plus_seconds(self, seconds: i64) -> Self {
        Self(self.0 + seconds as f64)
    }

    /// Whether the value has no fractional part
    pub fn is_whole(&self) -> bool {
        self.0.fract() == 0.0
    }

    /// Converts back to a datetime, if representable
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let seconds = self.0.floor();
        let nanos = ((self.0 - seconds) * 1_000_000_000.0).round() as u32;
        Utc.timestamp_opt(seconds as i64, nanos.min(999_999_999)).single()
    }
}

impl Serialize for NumericDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_whole() && self.0.abs() < MAX_EXACT_SECONDS {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for NumericDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("timestamp must be finite"));
        }
        Ok(Self(value))
    }
}

/// Scalar value of a caller-supplied extension claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::Text(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::Text(value)
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        ClaimValue::Integer(value)
    }
}

impl From<i32> for ClaimValue {
    fn from(value: i32) -> Self {
        ClaimValue::Integer(value.into())
    }
}

impl From<f64> for ClaimValue {
    fn from(value: f64) -> Self {
        ClaimValue::Float(value)
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        ClaimValue::Bool(value)
    }
}

/// Claims carried in a refresh token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Stringified user identity
    pub uid: String,

    /// Issued at
    pub iat: NumericDate,

    /// Expiration
    pub exp: NumericDate,

    /// Unique token id, present on every token this crate issues
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Caller-supplied extension claims
    #[serde(flatten)]
    pub extensions: BTreeMap<String, ClaimValue>,
}

impl Claims {
    /// The identity the token is bound to
    pub fn user_id(&self) -> UserId {
        UserId::new(self.uid.clone())
    }

    /// Whether `now` lies past expiry plus the allowed skew
    pub fn is_expired_at(&self, now: NumericDate, allowed_skew_seconds: i64) -> bool {
        now.as_f64() > self.exp.plus_seconds(allowed_skew_seconds).as_f64()
    }

    /// Issued-at as a datetime
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.to_datetime()
    }

    /// Expiry as a datetime
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.to_datetime()
    }

    /// Looks up an extension claim
    pub fn extension(&self, name: &str) -> Option<&ClaimValue> {
        self.extensions.get(name)
    }
}

/// Caller input to token signing: subject plus extension claims
///
/// `iat`, `exp` and `jti` are computed by the codec and cannot be set here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimSet {
    pub uid: String,
    pub extensions: BTreeMap<String, ClaimValue>,
}

impl ClaimSet {
    /// Claim set for a user with no extensions
    pub fn for_user(user_id: &UserId) -> Self {
        Self {
            uid: user_id.to_string(),
            extensions: BTreeMap::new(),
        }
    }

    /// Adds an extension claim
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.extensions.insert(name.into(), value.into());
        self
    }
}

/// JOSE header of a compact token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm; always overwritten from configuration when signing
    pub alg: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Default for TokenHeader {
    fn default() -> Self {
        Self {
            alg: String::new(),
            typ: Some(TOKEN_TYPE.to_string()),
            kid: None,
        }
    }
}

impl TokenHeader {
    /// Header carrying a key id
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

/// The single stored refresh token of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// Owner of the token; unique across records
    pub user_id: UserId,

    /// Serialized signed token
    pub token: String,

    /// When the record was first created
    pub created_at: DateTime<Utc>,

    /// When the token was last rotated
    pub updated_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Creates a new record for a freshly issued token
    pub fn new(user_id: UserId, token: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            token,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the token in place, keeping the identity binding
    pub fn rotate(&mut self, token: String) {
        self.token = token;
        self.updated_at = Utc::now();
    }
}
