//! Token store trait defining the persistence contract for refresh token records.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::entities::token::RefreshTokenRecord;
use crate::domain::value_objects::UserId;
use crate::errors::StoreError;

/// Storage contract for refresh token records
///
/// A store holds at most one record per user id, and it is the store, not
/// the caller, that enforces this: `insert` must fail with
/// [`StoreError::DuplicateKey`] when a record already exists, atomically with
/// respect to concurrent inserts for the same id.
///
/// There is deliberately no generic update or upsert method. The only way
/// to change a stored token is [`TokenStore::replace_token`], which the
/// lifecycle manager calls with a freshly signed token.
///
/// # Concurrency
/// - `insert` for the same id from concurrent callers: exactly one succeeds.
/// - `replace_token` for the same id is serialized (last write wins under a
///   per-identity lock); it never creates a record.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Fetch the record of a user
    ///
    /// # Returns
    /// * `Ok(Some(record))` - The user has a token
    /// * `Ok(None)` - The user has no token
    /// * `Err(StoreError)` - Backend failure
    async fn get(&self, user_id: &UserId) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Insert a new record
    ///
    /// # Returns
    /// * `Ok(())` - Record stored
    /// * `Err(StoreError::DuplicateKey)` - The user already has a record
    /// * `Err(StoreError::Backend)` - Backend failure
    ///
    /// # Example
    /// ```no_run
    /// # use tf_core::repositories::TokenStore;
    /// # use tf_core::domain::{RefreshTokenRecord, UserId};
    /// # async fn example(store: &impl TokenStore) -> Result<(), Box<dyn std::error::Error>> {
    /// let record = RefreshTokenRecord::new(UserId::from("42"), "header.payload.sig".to_string());
    /// store.insert(record).await?;
    /// # Ok(())
    /// # }
    /// ```
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;

    /// Replace the token string of an existing record in a single write
    ///
    /// # Returns
    /// * `Ok(record)` - The updated record
    /// * `Err(StoreError::NotFound)` - The user has no record
    /// * `Err(StoreError::Backend)` - Backend failure
    async fn replace_token(
        &self,
        user_id: &UserId,
        token: &str,
    ) -> Result<RefreshTokenRecord, StoreError>;
}

#[async_trait]
impl<S: TokenStore + ?Sized> TokenStore for Arc<S> {
    async fn get(&self, user_id: &UserId) -> Result<Option<RefreshTokenRecord>, StoreError> {
        (**self).get(user_id).await
    }

    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        (**self).insert(record).await
    }

    async fn replace_token(
        &self,
        user_id: &UserId,
        token: &str,
    ) -> Result<RefreshTokenRecord, StoreError> {
        (**self).replace_token(user_id, token).await
    }
}
