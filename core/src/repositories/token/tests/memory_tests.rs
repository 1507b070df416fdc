//! Tests for the in-memory token store

use std::sync::Arc;

use crate::domain::entities::token::RefreshTokenRecord;
use crate::domain::value_objects::UserId;
use crate::errors::StoreError;
use crate::repositories::token::{MemoryTokenStore, TokenStore};

fn record(user: &str, token: &str) -> RefreshTokenRecord {
    RefreshTokenRecord::new(UserId::from(user), token.to_string())
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let store = MemoryTokenStore::new();

    let found = store.get(&UserId::from("1")).await.unwrap();

    assert!(found.is_none());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_insert_then_get() {
    let store = MemoryTokenStore::new();
    store.insert(record("1", "a.b.c")).await.unwrap();

    let found = store.get(&UserId::from("1")).await.unwrap().unwrap();

    assert_eq!(found.token, "a.b.c");
    assert_eq!(found.user_id, UserId::from("1"));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_insert_duplicate_is_rejected() {
    let store = MemoryTokenStore::new();
    store.insert(record("1", "first")).await.unwrap();

    let result = store.insert(record("1", "second")).await;

    assert_eq!(
        result,
        Err(StoreError::DuplicateKey {
            user_id: UserId::from("1")
        })
    );
    let kept = store.get(&UserId::from("1")).await.unwrap().unwrap();
    assert_eq!(kept.token, "first");
}

#[tokio::test]
async fn test_replace_token_rotates_existing_record() {
    let store = MemoryTokenStore::new();
    store.insert(record("1", "old")).await.unwrap();
    let before = store.get(&UserId::from("1")).await.unwrap().unwrap();

    let updated = store.replace_token(&UserId::from("1"), "new").await.unwrap();

    assert_eq!(updated.token, "new");
    assert_eq!(updated.created_at, before.created_at);
    assert!(updated.updated_at >= before.updated_at);
    assert_eq!(store.get(&UserId::from("1")).await.unwrap().unwrap(), updated);
}

#[tokio::test]
async fn test_replace_token_never_creates() {
    let store = MemoryTokenStore::new();

    let result = store.replace_token(&UserId::from("9"), "token").await;

    assert!(matches!(result, Err(StoreError::NotFound { .. })));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_remove_drops_record() {
    let store = MemoryTokenStore::new();
    store.insert(record("1", "a.b.c")).await.unwrap();

    let removed = store.remove(&UserId::from("1")).await;

    assert!(removed.is_some());
    assert!(store.get(&UserId::from("1")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_clones_share_state() {
    let store = MemoryTokenStore::new();
    let other = store.clone();

    store.insert(record("1", "a.b.c")).await.unwrap();

    assert!(other.get(&UserId::from("1")).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_single_winner() {
    let store = Arc::new(MemoryTokenStore::new());

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.insert(record("42", &format!("token-{}", i))).await
        }));
    }

    let mut inserted = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => inserted += 1,
            Err(StoreError::DuplicateKey { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(inserted, 1);
    assert_eq!(duplicates, 15);
    assert_eq!(store.len().await, 1);
}
