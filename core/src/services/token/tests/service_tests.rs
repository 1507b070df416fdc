//! Tests for the token lifecycle manager

use std::fs;

use chrono::{Duration, Utc};
use tempfile::tempdir;

use tf_shared::config::{KeyConfig, KeyFormat, TokenConfig, TokenFlowConfig};

use crate::domain::entities::token::{ClaimValue, RefreshTokenRecord};
use crate::domain::value_objects::{UserId, UserRef};
use crate::errors::{KeyError, LifecycleError, TokenError};
use crate::repositories::{MemoryTokenStore, TokenStore};
use crate::services::token::{
    IssueOptions, OperationOutcome, RecordOperation, TokenLifecycleManager,
};

use super::{ed25519_private_pem, hs256_config, memory_manager, ED25519_SEED, OCT_JWK};

fn alice() -> UserRef {
    UserRef::new(1_i64, "alice")
}

#[tokio::test]
async fn test_create_then_get_or_create_returns_existing() {
    let manager = memory_manager(hs256_config());

    let created = manager.create(&alice()).await.unwrap();
    let (fetched, was_created) = manager.get_or_create(&alice()).await.unwrap();

    assert!(!was_created);
    assert_eq!(fetched.token, created.token);
    assert_eq!(fetched.user_id, UserId::from("1"));
}

#[tokio::test]
async fn test_get_or_create_creates_when_absent() {
    let manager = memory_manager(hs256_config());

    let (record, created) = manager.get_or_create(&alice()).await.unwrap();

    assert!(created);
    assert!(manager.is_valid(&record, Utc::now()).unwrap());
    assert_eq!(manager.store().len().await, 1);
}

#[tokio::test]
async fn test_create_twice_fails_with_label() {
    let manager = memory_manager(hs256_config());
    manager.create(&alice()).await.unwrap();

    let result = manager.create(&alice()).await;

    match result {
        Err(LifecycleError::AlreadyExists { label }) => assert_eq!(label, "alice"),
        other => panic!("expected AlreadyExists, got {:?}", other),
    }
}

#[tokio::test]
async fn test_already_exists_message_names_user() {
    let manager = memory_manager(hs256_config());
    manager.create(&alice()).await.unwrap();

    let error = manager.create(&alice()).await.unwrap_err();

    assert!(error.to_string().contains("alice"));
}

#[tokio::test]
async fn test_refresh_changes_token_and_stays_valid() {
    let manager = memory_manager(hs256_config());
    let created = manager.create(&alice()).await.unwrap();

    let refreshed = manager.refresh(&alice()).await.unwrap();

    assert_ne!(refreshed.token, created.token);
    assert_eq!(refreshed.user_id, created.user_id);
    assert_eq!(refreshed.created_at, created.created_at);
    assert!(manager.is_valid(&refreshed, Utc::now()).unwrap());

    let stored = manager.store().get(&alice().id).await.unwrap().unwrap();
    assert_eq!(stored.token, refreshed.token);
}

#[tokio::test]
async fn test_refresh_without_record_creates_one() {
    let manager = memory_manager(hs256_config());

    let record = manager.refresh(&alice()).await.unwrap();

    assert!(manager.is_valid(&record, Utc::now()).unwrap());
    assert_eq!(manager.store().len().await, 1);
}

#[tokio::test]
async fn test_tampered_record_is_invalid() {
    let manager = memory_manager(hs256_config());
    let mut record = manager.create(&alice()).await.unwrap();
    record.token.push('x');

    assert!(!manager.is_valid(&record, Utc::now()).unwrap());
}

#[tokio::test]
async fn test_garbage_record_is_invalid() {
    let manager = memory_manager(hs256_config());
    let record = RefreshTokenRecord::new(UserId::from("1"), "not-a-token".to_string());

    assert!(!manager.is_valid(&record, Utc::now()).unwrap());
    assert!(matches!(
        manager.verify_record(&record, Utc::now()),
        Err(LifecycleError::Token(TokenError::MalformedToken { .. }))
    ));
}

#[tokio::test]
async fn test_token_bound_to_other_user_is_invalid() {
    let manager = memory_manager(hs256_config());
    let bob = manager.create(&UserRef::new(2_i64, "bob")).await.unwrap();
    let stolen = RefreshTokenRecord::new(UserId::from("1"), bob.token);

    assert!(!manager.is_valid(&stolen, Utc::now()).unwrap());
    assert!(matches!(
        manager.verify_record(&stolen, Utc::now()),
        Err(LifecycleError::Token(TokenError::SubjectMismatch { .. }))
    ));
}

#[tokio::test]
async fn test_expired_record_is_invalid() {
    let manager = memory_manager(hs256_config());
    let options = IssueOptions::default().expiring_at(Utc::now() + Duration::minutes(5));
    let record = manager.create_with(&alice(), options).await.unwrap();

    let later = Utc::now() + Duration::hours(1);

    assert!(!manager.is_valid(&record, later).unwrap());
    assert!(matches!(
        manager.verify_record(&record, later),
        Err(LifecycleError::Token(TokenError::ExpiredToken))
    ));
}

#[tokio::test]
async fn test_create_with_past_expiry_fails() {
    let manager = memory_manager(hs256_config());
    let options = IssueOptions::default().expiring_at(Utc::now() - Duration::minutes(5));

    let result = manager.create_with(&alice(), options).await;

    assert!(matches!(
        result,
        Err(LifecycleError::Token(TokenError::ExpiryNotInFuture))
    ));
    assert!(manager.store().is_empty().await);
}

#[tokio::test]
async fn test_create_with_extension_claims() {
    let manager = memory_manager(hs256_config());
    let options = IssueOptions::default()
        .with_claim("scope", "offline")
        .with_claim("uid", "spoofed")
        .with_kid("primary");

    let record = manager.create_with(&alice(), options).await.unwrap();
    let claims = manager.verify_record(&record, Utc::now()).unwrap();

    assert_eq!(claims.uid, "1");
    assert_eq!(claims.extension("scope"), Some(&ClaimValue::from("offline")));
    assert!(claims.extension("uid").is_none());
}

#[tokio::test]
async fn test_configuration_errors_propagate_from_is_valid() {
    let manager = memory_manager(KeyConfig::default());
    let record = RefreshTokenRecord::new(UserId::from("1"), "a.b.c".to_string());

    let result = manager.is_valid(&record, Utc::now());

    assert!(matches!(
        result,
        Err(LifecycleError::Configuration(KeyError::KeyNotConfigured))
    ));
}

#[tokio::test]
async fn test_create_without_key_fails() {
    let manager = memory_manager(KeyConfig::default());

    let result = manager.create(&alice()).await;

    assert!(matches!(result, Err(LifecycleError::Configuration(_))));
    assert!(manager.store().is_empty().await);
}

#[tokio::test]
async fn test_resolved_key_is_cached() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("signing.json");
    fs::write(&path, OCT_JWK).unwrap();
    let manager = memory_manager(KeyConfig::from_file(&path));

    let first = manager.signing_key().unwrap();
    fs::remove_file(&path).unwrap();
    let second = manager.signing_key().unwrap();

    assert_eq!(first.fingerprint(), second.fingerprint());
    assert!(manager.create(&alice()).await.is_ok());
}

#[tokio::test]
async fn test_uncached_key_is_resolved_each_time() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("signing.json");
    fs::write(&path, OCT_JWK).unwrap();
    let manager = memory_manager(KeyConfig::from_file(&path).with_cache(false));

    assert!(manager.signing_key().is_ok());
    fs::remove_file(&path).unwrap();

    assert!(matches!(
        manager.signing_key(),
        Err(LifecycleError::Configuration(KeyError::KeyFileNotFound { .. }))
    ));
}

#[tokio::test]
async fn test_eddsa_lifecycle() {
    let config = KeyConfig::inline(ed25519_private_pem(&ED25519_SEED), KeyFormat::Pem)
        .with_algorithm("EdDSA");
    let manager = memory_manager(config);

    let record = manager.create(&alice()).await.unwrap();
    let refreshed = manager.refresh(&alice()).await.unwrap();

    assert!(manager.is_valid(&record, Utc::now()).unwrap());
    assert!(manager.is_valid(&refreshed, Utc::now()).unwrap());
}

#[tokio::test]
async fn test_from_config_uses_token_settings() {
    let config = TokenFlowConfig {
        key: hs256_config(),
        token: TokenConfig::default()
            .with_refresh_window_days(1)
            .with_allowed_skew_seconds(5),
        ..TokenFlowConfig::default()
    };
    let manager = TokenLifecycleManager::from_config(MemoryTokenStore::new(), &config);

    let record = manager.create(&alice()).await.unwrap();
    let claims = manager.verify_record(&record, Utc::now()).unwrap();

    assert_eq!(manager.config().allowed_skew_seconds, 5);
    assert_eq!(claims.exp.as_f64() - claims.iat.as_f64(), 86400.0);
}

#[tokio::test]
async fn test_oversized_window_fails_without_panic() {
    let config = TokenFlowConfig {
        key: hs256_config(),
        token: TokenConfig::default().with_refresh_window_days(100_000_000),
        ..TokenFlowConfig::default()
    };
    assert!(config.validate().is_err());
    let manager = TokenLifecycleManager::from_config(MemoryTokenStore::new(), &config);

    let result = manager.create(&UserRef::from_id("1")).await;

    assert!(matches!(
        result,
        Err(LifecycleError::Token(TokenError::SigningFailed { .. }))
    ));
    assert!(manager.store().is_empty().await);
}

#[tokio::test]
async fn test_execute_dispatch() {
    let manager = memory_manager(hs256_config());

    let created = manager.execute(RecordOperation::Create, &alice()).await.unwrap();
    assert!(matches!(created, OperationOutcome::Created(_)));

    let fetched = manager
        .execute(RecordOperation::GetOrCreate, &alice())
        .await
        .unwrap();
    assert!(matches!(fetched, OperationOutcome::Fetched(_)));
    assert_eq!(fetched.record().token, created.record().token);

    let refreshed = manager.execute(RecordOperation::Refresh, &alice()).await.unwrap();
    assert!(matches!(refreshed, OperationOutcome::Refreshed(_)));
    assert_ne!(refreshed.into_record().token, created.into_record().token);
}

#[tokio::test]
async fn test_execute_get_or_create_reports_creation() {
    let manager = memory_manager(hs256_config());

    let outcome = manager
        .execute(RecordOperation::GetOrCreate, &alice())
        .await
        .unwrap();

    assert!(matches!(outcome, OperationOutcome::Created(_)));
}

#[tokio::test]
async fn test_generic_updates_are_disallowed() {
    let manager = memory_manager(hs256_config());
    let created = manager.create(&alice()).await.unwrap();

    for operation in [RecordOperation::Update, RecordOperation::UpdateOrCreate] {
        let result = manager.execute(operation, &alice()).await;
        match result {
            Err(LifecycleError::DisallowedOperation { operation: name }) => {
                assert_eq!(name, operation.to_string());
            }
            other => panic!("expected DisallowedOperation, got {:?}", other),
        }
    }

    let stored = manager.store().get(&alice().id).await.unwrap().unwrap();
    assert_eq!(stored.token, created.token);
}

#[test]
fn test_record_operation_parsing() {
    assert_eq!("create".parse::<RecordOperation>().unwrap(), RecordOperation::Create);
    assert_eq!(
        "get-or-create".parse::<RecordOperation>().unwrap(),
        RecordOperation::GetOrCreate
    );
    assert_eq!("REFRESH".parse::<RecordOperation>().unwrap(), RecordOperation::Refresh);
    assert_eq!(
        "update_or_create".parse::<RecordOperation>().unwrap(),
        RecordOperation::UpdateOrCreate
    );
    assert!(matches!(
        "delete".parse::<RecordOperation>(),
        Err(LifecycleError::DisallowedOperation { .. })
    ));
    assert_eq!(RecordOperation::GetOrCreate.to_string(), "get_or_create");
}
