//! In-memory implementation of TokenStore

use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::entities::token::RefreshTokenRecord;
use crate::domain::value_objects::UserId;
use crate::errors::StoreError;

use super::r#trait::TokenStore;

/// Token store backed by a map behind an async read-write lock
///
/// Every mutation holds the write lock for its whole check-and-write, which
/// gives the uniqueness guarantee of `insert` and serializes rotations.
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    records: Arc<RwLock<HashMap<UserId, RefreshTokenRecord>>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drop the record of a user whose identity was deleted
    pub async fn remove(&self, user_id: &UserId) -> Option<RefreshTokenRecord> {
        self.records.write().await.remove(user_id)
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(user_id).cloned())
    }

    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;

        match records.entry(record.user_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey {
                user_id: record.user_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn replace_token(
        &self,
        user_id: &UserId,
        token: &str,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let mut records = self.records.write().await;

        match records.get_mut(user_id) {
            Some(record) => {
                record.rotate(token.to_string());
                Ok(record.clone())
            }
            None => Err(StoreError::NotFound {
                user_id: user_id.clone(),
            }),
        }
    }
}
