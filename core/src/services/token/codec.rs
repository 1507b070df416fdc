//! Compact token signing and verification
//!
//! Tokens are `b64url(header).b64url(payload).b64url(signature)` with
//! unpadded base64url segments and JSON header and payload.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use tracing::debug;

use crate::domain::entities::token::{
    ClaimSet, ClaimValue, Claims, NumericDate, TokenHeader, RESERVED_CLAIMS,
};
use crate::errors::TokenError;

use super::config::LifecycleConfig;
use super::key_source::SigningKey;

/// Builds, signs and verifies refresh token claim sets
#[derive(Debug, Clone)]
pub struct ClaimsCodec {
    refresh_window: Duration,
    sub_second: bool,
}

impl ClaimsCodec {
    pub fn new(refresh_window: Duration, sub_second: bool) -> Self {
        Self {
            refresh_window,
            sub_second,
        }
    }

    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::new(config.refresh_window, config.use_sub_second_timestamps)
    }

    pub fn refresh_window(&self) -> Duration {
        self.refresh_window
    }

    /// Signs a claim set into a compact token
    ///
    /// `iat` is `now`, `exp` is `expires_at` or `now` plus the refresh
    /// window, and a fresh `jti` is added. Extension claims that collide
    /// with these names are dropped. The header's `alg` is always taken
    /// from the key; its `kid` falls back to the key's.
    ///
    /// The key is already resolved: callers holding a [`KeySource`] call
    /// [`KeySource::resolve_key`] first, as `TokenLifecycleManager` does with
    /// its cached key.
    ///
    /// [`KeySource`]: crate::services::token::KeySource
    /// [`KeySource::resolve_key`]: crate::services::token::KeySource::resolve_key
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The serialized token
    /// * `Err(TokenError::ExpiryNotInFuture)` - Explicit expiry is not after `now`
    /// * `Err(TokenError::SigningFailed)` - The expiry overflows, an extension
    ///   is a non-finite float, or serialization or signing failed
    pub fn sign(
        &self,
        claims: &ClaimSet,
        mut header: TokenHeader,
        now: DateTime<Utc>,
        key: &SigningKey,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<String, TokenError> {
        let expires_at = match expires_at {
            Some(at) if at <= now => return Err(TokenError::ExpiryNotInFuture),
            Some(at) => at,
            None => now
                .checked_add_signed(self.refresh_window)
                .ok_or_else(|| TokenError::SigningFailed {
                    message: format!(
                        "refresh window of {}s overflows the expiry timestamp",
                        self.refresh_window.num_seconds()
                    ),
                })?,
        };

        let iat = NumericDate::from_datetime(now, self.sub_second);
        let exp = NumericDate::from_datetime(expires_at, self.sub_second);
        if exp <= iat {
            return Err(TokenError::ExpiryNotInFuture);
        }

        let mut extensions = claims.extensions.clone();
        for name in RESERVED_CLAIMS {
            if extensions.remove(name).is_some() {
                debug!(claim = name, "Dropped reserved claim from caller extensions");
            }
        }
        // JSON has no NaN or infinity; serde_json would write them as null.
        if let Some((name, _)) = extensions
            .iter()
            .find(|(_, value)| matches!(value, ClaimValue::Float(f) if !f.is_finite()))
        {
            return Err(TokenError::SigningFailed {
                message: format!("extension claim '{}' is not a finite number", name),
            });
        }

        let payload = Claims {
            uid: claims.uid.clone(),
            iat,
            exp,
            jti: Some(Uuid::new_v4().to_string()),
            extensions,
        };

        header.alg = key.algorithm_name();
        if header.kid.is_none() {
            header.kid = key.kid().map(str::to_string);
        }

        let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(&payload)?);
        let signature = key
            .sign(signing_input.as_bytes())
            .map_err(|e| TokenError::SigningFailed {
                message: e.to_string(),
            })?;

        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Verifies a compact token and returns its claims
    ///
    /// Checks run in order: structure, signature, expiry. A token is expired
    /// once `now` lies past `exp + allowed_skew_seconds`; an `iat` in the
    /// future is accepted.
    ///
    /// # Returns
    ///
    /// * `Ok(Claims)` - Token is authentic and not expired
    /// * `Err(TokenError::MalformedToken)` - Not a well-formed compact token
    /// * `Err(TokenError::InvalidSignature)` - Wrong algorithm or signature
    /// * `Err(TokenError::ExpiredToken)` - Past expiry plus skew
    pub fn verify(
        &self,
        token: &str,
        key: &SigningKey,
        now: DateTime<Utc>,
        allowed_skew_seconds: i64,
    ) -> Result<Claims, TokenError> {
        let parts = CompactParts::parse(token)?;

        if parts.header.alg != key.algorithm_name() {
            debug!(
                token_alg = %parts.header.alg,
                key_alg = %key.algorithm_name(),
                "Token algorithm does not match key"
            );
            return Err(TokenError::InvalidSignature);
        }

        if !key.verify(parts.signing_input.as_bytes(), parts.signature) {
            return Err(TokenError::InvalidSignature);
        }

        if parts
            .claims
            .is_expired_at(NumericDate::from_datetime(now, true), allowed_skew_seconds)
        {
            return Err(TokenError::ExpiredToken);
        }

        Ok(parts.claims)
    }

    /// Decodes header and claims without checking the signature or expiry
    ///
    /// For administrative display only. Never use the result to authorize
    /// anything.
    pub fn inspect(token: &str) -> Result<(TokenHeader, Claims), TokenError> {
        let parts = CompactParts::parse(token)?;
        Ok((parts.header, parts.claims))
    }
}

struct CompactParts<'a> {
    header: TokenHeader,
    claims: Claims,
    signing_input: &'a str,
    signature: &'a str,
}

impl<'a> CompactParts<'a> {
    fn parse(token: &'a str) -> Result<Self, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(TokenError::malformed(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        }
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(TokenError::malformed("empty segment"));
        }

        let header = decode_segment(segments[0], "header")?;
        let claims = decode_segment(segments[1], "payload")?;
        URL_SAFE_NO_PAD
            .decode(segments[2])
            .map_err(|e| TokenError::malformed(format!("signature is not base64url: {}", e)))?;

        let signing_input = &token[..segments[0].len() + 1 + segments[1].len()];

        Ok(Self {
            header,
            claims,
            signing_input,
            signature: segments[2],
        })
    }
}

fn encode_segment<T: serde::Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|e| TokenError::SigningFailed {
        message: e.to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: DeserializeOwned>(segment: &str, name: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::malformed(format!("{} is not base64url: {}", name, e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::malformed(format!("{} is not valid JSON: {}", name, e)))
}
