mod service_tests;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::Algorithm;

use tf_shared::config::{KeyConfig, KeyFormat};

use crate::repositories::MemoryTokenStore;
use crate::services::token::{KeySource, LifecycleConfig, SigningKey, TokenLifecycleManager};

/// Symmetric JWK used across the lifecycle tests
pub(crate) const OCT_JWK: &str = r#"{"kty":"oct","k":"-z6e2mZKlX-_9Oa5lw1qaQ"}"#;

pub(crate) const ED25519_SEED: [u8; 32] = [7u8; 32];

const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

pub(crate) fn hs256_config() -> KeyConfig {
    KeyConfig::inline(OCT_JWK, KeyFormat::Json)
}

pub(crate) fn hs256_key() -> SigningKey {
    KeySource::new(hs256_config()).resolve_key().unwrap()
}

pub(crate) fn ed25519_key() -> SigningKey {
    SigningKey::from_ed25519_seed(&ED25519_SEED).unwrap()
}

pub(crate) fn pem_block(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let lines: Vec<&str> = body
        .as_bytes()
        .chunks(64)
        .map(|chunk| std::str::from_utf8(chunk).unwrap())
        .collect();
    format!("-----BEGIN {label}-----\n{}\n-----END {label}-----\n", lines.join("\n"))
}

pub(crate) fn ed25519_private_pem(seed: &[u8; 32]) -> String {
    let mut der = ED25519_PKCS8_PREFIX.to_vec();
    der.extend_from_slice(seed);
    pem_block("PRIVATE KEY", &der)
}

pub(crate) fn ed25519_public_pem(seed: &[u8; 32]) -> String {
    let public = ed25519_dalek::SigningKey::from_bytes(seed)
        .verifying_key()
        .to_bytes();
    let mut der = ED25519_SPKI_PREFIX.to_vec();
    der.extend_from_slice(&public);
    pem_block("PUBLIC KEY", &der)
}

pub(crate) fn memory_manager(key: KeyConfig) -> TokenLifecycleManager<MemoryTokenStore> {
    TokenLifecycleManager::new(
        MemoryTokenStore::new(),
        KeySource::new(key),
        LifecycleConfig::default(),
    )
}

#[test]
fn test_fixture_keys_resolve() {
    assert_eq!(hs256_key().algorithm(), Algorithm::HS256);
    assert_eq!(ed25519_key().algorithm(), Algorithm::EdDSA);
}
