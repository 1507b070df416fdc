//! MySQL implementation of the TokenStore trait.
//!
//! Records live in `refresh_tokens`, whose unique key on `user_id` is the
//! only thing that turns a second insert into `StoreError::DuplicateKey`.
//! `user_id` is stored as `VARBINARY`, so ids that differ only in case or
//! trailing spaces are distinct users.
//! Rotations lock the row with `SELECT ... FOR UPDATE` inside a transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{MySqlPool, Row};

use tf_core::domain::entities::token::RefreshTokenRecord;
use tf_core::domain::value_objects::UserId;
use tf_core::errors::StoreError;
use tf_core::repositories::TokenStore;

// SQLSTATE class for integrity constraint violations and MySQL's ER_DUP_ENTRY.
const INTEGRITY_VIOLATION_STATE: &str = "23000";
const DUPLICATE_ENTRY_ERRNO: u16 = 1062;

/// MySQL implementation of TokenStore
#[derive(Clone)]
pub struct MySqlTokenStore {
    pool: MySqlPool,
}

impl MySqlTokenStore {
    /// Create a new MySQL token store
    ///
    /// # Arguments
    /// * `pool` - MySQL connection pool from SQLx
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Convert database row to a token record
    fn row_to_record(row: &MySqlRow) -> Result<RefreshTokenRecord, StoreError> {
        let user_id: Vec<u8> = row
            .try_get("user_id")
            .map_err(|e| backend("Failed to get user_id", e))?;
        let user_id = String::from_utf8(user_id)
            .map_err(|e| StoreError::backend(format!("Stored user_id is not UTF-8: {}", e)))?;

        Ok(RefreshTokenRecord {
            user_id: UserId::new(user_id),
            token: row
                .try_get("token")
                .map_err(|e| backend("Failed to get token", e))?,
            created_at: row
                .try_get::<DateTime<Utc>, _>("created_at")
                .map_err(|e| backend("Failed to get created_at", e))?,
            updated_at: row
                .try_get::<DateTime<Utc>, _>("updated_at")
                .map_err(|e| backend("Failed to get updated_at", e))?,
        })
    }
}

fn backend(context: &str, e: sqlx::Error) -> StoreError {
    StoreError::backend(format!("{}: {}", context, e))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(mysql_err) = db_err.try_downcast_ref::<MySqlDatabaseError>() {
            return mysql_err.number() == DUPLICATE_ENTRY_ERRNO;
        }
        return db_err
            .code()
            .map(|code| code == INTEGRITY_VIOLATION_STATE)
            .unwrap_or(false);
    }
    false
}

#[async_trait]
impl TokenStore for MySqlTokenStore {
    async fn get(&self, user_id: &UserId) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let query = r#"
            SELECT user_id, token, created_at, updated_at
            FROM refresh_tokens
            WHERE user_id = ?
            LIMIT 1
        "#;

        let result = sqlx::query(query)
            .bind(user_id.as_str().as_bytes())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend("Failed to find refresh token", e))?;

        match result {
            Some(row) => Ok(Some(Self::row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let query = r#"
            INSERT INTO refresh_tokens (user_id, token, created_at, updated_at)
            VALUES (?, ?, ?, ?)
        "#;

        let result = sqlx::query(query)
            .bind(record.user_id.as_str().as_bytes())
            .bind(&record.token)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                tracing::warn!(user_id = %record.user_id, "Duplicate refresh token insert rejected");
                Err(StoreError::DuplicateKey {
                    user_id: record.user_id,
                })
            }
            Err(err) => Err(backend("Failed to save refresh token", err)),
        }
    }

    async fn replace_token(
        &self,
        user_id: &UserId,
        token: &str,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| backend("Failed to begin transaction", e))?;

        let row = sqlx::query(
            r#"
            SELECT user_id, token, created_at, updated_at
            FROM refresh_tokens
            WHERE user_id = ?
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_str().as_bytes())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| backend("Failed to lock refresh token", e))?;

        let mut record = match row {
            Some(row) => Self::row_to_record(&row)?,
            None => {
                return Err(StoreError::NotFound {
                    user_id: user_id.clone(),
                })
            }
        };
        record.rotate(token.to_string());

        sqlx::query("UPDATE refresh_tokens SET token = ?, updated_at = ? WHERE user_id = ?")
            .bind(&record.token)
            .bind(record.updated_at)
            .bind(user_id.as_str().as_bytes())
            .execute(&mut *tx)
            .await
            .map_err(|e| backend("Failed to replace refresh token", e))?;

        tx.commit()
            .await
            .map_err(|e| backend("Failed to commit token rotation", e))?;

        Ok(record)
    }
}
