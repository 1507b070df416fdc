//! Token lifecycle manager implementation

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use tf_shared::config::TokenFlowConfig;

use crate::domain::entities::token::{ClaimSet, ClaimValue, Claims, RefreshTokenRecord, TokenHeader};
use crate::domain::value_objects::UserRef;
use crate::errors::{LifecycleError, LifecycleResult, StoreError, TokenError};
use crate::repositories::TokenStore;

use super::codec::ClaimsCodec;
use super::config::LifecycleConfig;
use super::key_source::{KeySource, SigningKey};

/// Caller-supplied extras for a token being issued
#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    /// Scalar extension claims; reserved names are dropped when signing
    pub extensions: BTreeMap<String, ClaimValue>,
    /// Explicit expiry; must lie in the future
    pub expires_at: Option<DateTime<Utc>>,
    /// Key id for the token header
    pub kid: Option<String>,
}

impl IssueOptions {
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.extensions.insert(name.into(), value.into());
        self
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

/// Operation names accepted by [`TokenLifecycleManager::execute`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOperation {
    Create,
    GetOrCreate,
    Refresh,
    /// Generic update; always rejected
    Update,
    /// Generic upsert; always rejected
    UpdateOrCreate,
}

impl fmt::Display for RecordOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordOperation::Create => "create",
            RecordOperation::GetOrCreate => "get_or_create",
            RecordOperation::Refresh => "refresh",
            RecordOperation::Update => "update",
            RecordOperation::UpdateOrCreate => "update_or_create",
        };
        f.write_str(name)
    }
}

impl FromStr for RecordOperation {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "create" => Ok(RecordOperation::Create),
            "get_or_create" => Ok(RecordOperation::GetOrCreate),
            "refresh" => Ok(RecordOperation::Refresh),
            "update" => Ok(RecordOperation::Update),
            "update_or_create" => Ok(RecordOperation::UpdateOrCreate),
            _ => Err(LifecycleError::DisallowedOperation {
                operation: s.to_string(),
            }),
        }
    }
}

/// Result of a dispatched operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome {
    Created(RefreshTokenRecord),
    Fetched(RefreshTokenRecord),
    Refreshed(RefreshTokenRecord),
}

impl OperationOutcome {
    pub fn record(&self) -> &RefreshTokenRecord {
        match self {
            OperationOutcome::Created(record)
            | OperationOutcome::Fetched(record)
            | OperationOutcome::Refreshed(record) => record,
        }
    }

    pub fn into_record(self) -> RefreshTokenRecord {
        match self {
            OperationOutcome::Created(record)
            | OperationOutcome::Fetched(record)
            | OperationOutcome::Refreshed(record) => record,
        }
    }
}

/// Issues, rotates and validates the single refresh token of each user
///
/// Uniqueness is left to the store: `create` never checks for an existing
/// record first, it relies on the store rejecting the insert.
pub struct TokenLifecycleManager<S: TokenStore> {
    pub(crate) store: S,
    key_source: KeySource,
    codec: ClaimsCodec,
    config: LifecycleConfig,
    cached_key: OnceCell<Arc<SigningKey>>,
}

impl<S: TokenStore> TokenLifecycleManager<S> {
    /// Creates a new lifecycle manager
    ///
    /// # Arguments
    ///
    /// * `store` - Token store enforcing one record per user
    /// * `key_source` - Where the signing key is resolved from
    /// * `config` - Token lifetime and skew settings
    pub fn new(store: S, key_source: KeySource, config: LifecycleConfig) -> Self {
        Self {
            store,
            key_source,
            codec: ClaimsCodec::from_config(&config),
            config,
            cached_key: OnceCell::new(),
        }
    }

    /// Creates a manager from the complete application configuration
    pub fn from_config(store: S, config: &TokenFlowConfig) -> Self {
        Self::new(
            store,
            KeySource::new(config.key.clone()),
            LifecycleConfig::from(&config.token),
        )
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &ClaimsCodec {
        &self.codec
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// The signing key, resolved once per manager when caching is enabled
    pub fn signing_key(&self) -> LifecycleResult<Arc<SigningKey>> {
        if self.key_source.config().cache_resolved_key {
            let key = self
                .cached_key
                .get_or_try_init(|| self.key_source.resolve_key().map(Arc::new))?;
            Ok(Arc::clone(key))
        } else {
            Ok(Arc::new(self.key_source.resolve_key()?))
        }
    }

    fn issue(
        &self,
        user: &UserRef,
        options: &IssueOptions,
        now: DateTime<Utc>,
    ) -> LifecycleResult<String> {
        let key = self.signing_key()?;
        let claims = ClaimSet {
            uid: user.id.to_string(),
            extensions: options.extensions.clone(),
        };
        let header = TokenHeader {
            kid: options.kid.clone(),
            ..TokenHeader::default()
        };

        let token = self
            .codec
            .sign(&claims, header, now, &key, options.expires_at)?;
        debug!(user_id = %user.id, fingerprint = %key.fingerprint(), "Signed refresh token");
        Ok(token)
    }

    /// Issues the first token of a user
    ///
    /// # Returns
    ///
    /// * `Ok(RefreshTokenRecord)` - The stored record
    /// * `Err(LifecycleError::AlreadyExists)` - The user already has a token
    pub async fn create(&self, user: &UserRef) -> LifecycleResult<RefreshTokenRecord> {
        self.create_with(user, IssueOptions::default()).await
    }

    /// Issues the first token of a user with extension claims or an explicit expiry
    pub async fn create_with(
        &self,
        user: &UserRef,
        options: IssueOptions,
    ) -> LifecycleResult<RefreshTokenRecord> {
        let token = self.issue(user, &options, Utc::now())?;
        let record = RefreshTokenRecord::new(user.id.clone(), token);

        match self.store.insert(record.clone()).await {
            Ok(()) => {
                info!(user_id = %user.id, "Created refresh token");
                Ok(record)
            }
            Err(StoreError::DuplicateKey { .. }) => {
                warn!(user_id = %user.id, "Refresh token already exists");
                Err(LifecycleError::AlreadyExists {
                    label: user.label.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the user's record, creating it when absent
    ///
    /// # Returns
    ///
    /// * `Ok((record, created))` - `created` is true when this call issued the token
    pub async fn get_or_create(&self, user: &UserRef) -> LifecycleResult<(RefreshTokenRecord, bool)> {
        if let Some(record) = self.store.get(&user.id).await? {
            return Ok((record, false));
        }

        match self.create(user).await {
            Ok(record) => Ok((record, true)),
            Err(LifecycleError::AlreadyExists { label }) => {
                // A concurrent creator won; hand back its record.
                match self.store.get(&user.id).await? {
                    Some(record) => Ok((record, false)),
                    None => Err(LifecycleError::AlreadyExists { label }),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Rotates the user's token, creating a record if there is none
    pub async fn refresh(&self, user: &UserRef) -> LifecycleResult<RefreshTokenRecord> {
        self.refresh_with(user, IssueOptions::default()).await
    }

    /// Rotates the user's token with extension claims or an explicit expiry
    pub async fn refresh_with(
        &self,
        user: &UserRef,
        options: IssueOptions,
    ) -> LifecycleResult<RefreshTokenRecord> {
        let token = self.issue(user, &options, Utc::now())?;

        let record = match self.store.replace_token(&user.id, &token).await {
            Ok(record) => record,
            Err(StoreError::NotFound { .. }) => {
                let record = RefreshTokenRecord::new(user.id.clone(), token.clone());
                match self.store.insert(record.clone()).await {
                    Ok(()) => record,
                    Err(StoreError::DuplicateKey { .. }) => {
                        warn!(user_id = %user.id, "Concurrent create during refresh, replacing again");
                        self.store.replace_token(&user.id, &token).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        info!(user_id = %user.id, "Refreshed refresh token");
        Ok(record)
    }

    /// Verifies a stored record and returns its claims
    ///
    /// # Returns
    ///
    /// * `Ok(Claims)` - The token is authentic, unexpired and bound to the record's user
    /// * `Err(LifecycleError::Token)` - Malformed, bad signature, expired or wrong subject
    /// * `Err(LifecycleError::Configuration)` - The key could not be resolved
    pub fn verify_record(
        &self,
        record: &RefreshTokenRecord,
        now: DateTime<Utc>,
    ) -> LifecycleResult<Claims> {
        let key = self.signing_key()?;
        let claims = self
            .codec
            .verify(&record.token, &key, now, self.config.allowed_skew_seconds)?;

        if claims.uid != record.user_id.as_str() {
            return Err(TokenError::SubjectMismatch {
                expected: record.user_id.to_string(),
                found: claims.uid,
            }
            .into());
        }

        Ok(claims)
    }

    /// Whether a stored record holds a currently valid token
    ///
    /// Validation outcomes become `false`; key configuration errors propagate.
    pub fn is_valid(&self, record: &RefreshTokenRecord, now: DateTime<Utc>) -> LifecycleResult<bool> {
        match self.verify_record(record, now) {
            Ok(_) => Ok(true),
            Err(e) if e.is_validation_outcome() => {
                debug!(user_id = %record.user_id, reason = %e, "Refresh token is not valid");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Dispatches an operation by name
    ///
    /// Generic `update` and `update_or_create` are rejected; tokens only
    /// change through `refresh`.
    pub async fn execute(
        &self,
        operation: RecordOperation,
        user: &UserRef,
    ) -> LifecycleResult<OperationOutcome> {
        match operation {
            RecordOperation::Create => self.create(user).await.map(OperationOutcome::Created),
            RecordOperation::GetOrCreate => {
                let (record, created) = self.get_or_create(user).await?;
                Ok(if created {
                    OperationOutcome::Created(record)
                } else {
                    OperationOutcome::Fetched(record)
                })
            }
            RecordOperation::Refresh => self.refresh(user).await.map(OperationOutcome::Refreshed),
            RecordOperation::Update | RecordOperation::UpdateOrCreate => {
                warn!(user_id = %user.id, operation = %operation, "Rejected generic token mutation");
                Err(LifecycleError::DisallowedOperation {
                    operation: operation.to_string(),
                })
            }
        }
    }
}
