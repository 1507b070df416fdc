//! Signing key resolution from configuration
//!
//! A key is resolved from a file (the extension selects the decoder) or
//! from inline material in the declared format. PEM, JSON Web Key and a
//! TOML rendering of the JWK members are understood.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use constant_time_eq::constant_time_eq;
use jsonwebtoken::{crypto, Algorithm, DecodingKey, EncodingKey};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use tf_shared::config::{KeyConfig, KeyFormat, KeyMaterial};

use crate::errors::KeyError;

// PKCS#8 v1 wrapper for a raw Ed25519 seed (RFC 8410).
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

const ED25519_KEY_LENGTH: usize = 32;

/// Whether a key signs with a shared secret or a key pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Symmetric,
    Asymmetric,
}

impl KeyFamily {
    /// Family of a signature algorithm
    pub fn of(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => KeyFamily::Symmetric,
            _ => KeyFamily::Asymmetric,
        }
    }
}

/// Name of an algorithm as it appears in the `alg` header
pub fn algorithm_name(algorithm: Algorithm) -> String {
    format!("{:?}", algorithm)
}

/// Parses a configured algorithm identifier
pub fn parse_algorithm(name: &str) -> Result<Algorithm, KeyError> {
    Algorithm::from_str(name.trim()).map_err(|_| KeyError::UnsupportedAlgorithm {
        algorithm: name.to_string(),
    })
}

/// A resolved key holding both the signing and the verification half
///
/// Immutable once resolved. Key bytes are never exposed through `Debug`;
/// the fingerprint is the first 16 hex characters of the SHA-256 of the
/// verification material and is safe to log.
#[derive(Clone)]
pub struct SigningKey {
    algorithm: Algorithm,
    family: KeyFamily,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    kid: Option<String>,
    fingerprint: String,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .field("family", &self.family)
            .field("kid", &self.kid)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl SigningKey {
    /// Shared-secret key for an HS* algorithm
    pub fn from_secret(secret: &[u8], algorithm: Algorithm) -> Result<Self, KeyError> {
        if KeyFamily::of(algorithm) != KeyFamily::Symmetric {
            return Err(KeyError::invalid(format!(
                "a shared secret cannot sign with {}",
                algorithm_name(algorithm)
            )));
        }
        if secret.is_empty() {
            return Err(KeyError::invalid("secret is empty"));
        }

        Ok(Self {
            algorithm,
            family: KeyFamily::Symmetric,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            kid: None,
            fingerprint: fingerprint(secret),
        })
    }

    /// Ed25519 key from its 32-byte seed; the public half is derived
    pub fn from_ed25519_seed(seed: &[u8]) -> Result<Self, KeyError> {
        let seed: [u8; ED25519_KEY_LENGTH] = seed
            .try_into()
            .map_err(|_| KeyError::invalid("Ed25519 private key must be 32 bytes"))?;
        let public = ed25519_dalek::SigningKey::from_bytes(&seed)
            .verifying_key()
            .to_bytes();

        let mut pkcs8 = Vec::with_capacity(ED25519_PKCS8_PREFIX.len() + ED25519_KEY_LENGTH);
        pkcs8.extend_from_slice(&ED25519_PKCS8_PREFIX);
        pkcs8.extend_from_slice(&seed);

        Ok(Self {
            algorithm: Algorithm::EdDSA,
            family: KeyFamily::Asymmetric,
            encoding_key: EncodingKey::from_ed_der(&pkcs8),
            decoding_key: DecodingKey::from_ed_der(&public),
            kid: None,
            fingerprint: fingerprint(&public),
        })
    }

    /// Attach a key id that is written to the header of signed tokens
    pub fn with_kid(mut self, kid: Option<String>) -> Self {
        self.kid = kid;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn algorithm_name(&self) -> String {
        algorithm_name(self.algorithm)
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Signs `message`, returning the unpadded base64url signature
    pub(crate) fn sign(&self, message: &[u8]) -> Result<String, jsonwebtoken::errors::Error> {
        crypto::sign(message, &self.encoding_key, self.algorithm)
    }

    /// Checks a signature over `message`
    ///
    /// HMAC signatures are recomputed and compared in constant time.
    pub(crate) fn verify(&self, message: &[u8], signature: &str) -> bool {
        match self.family {
            KeyFamily::Symmetric => {
                let expected = match self.sign(message) {
                    Ok(expected) => expected,
                    Err(_) => return false,
                };
                match (URL_SAFE_NO_PAD.decode(expected), URL_SAFE_NO_PAD.decode(signature)) {
                    (Ok(expected), Ok(given)) => constant_time_eq(&expected, &given),
                    _ => false,
                }
            }
            KeyFamily::Asymmetric => {
                crypto::verify(signature, message, &self.decoding_key, self.algorithm)
                    .unwrap_or(false)
            }
        }
    }
}

/// Resolves the configured signing key
///
/// Resolution order: key file, then inline material. Nothing is cached
/// here; the lifecycle manager decides whether to keep the result.
#[derive(Debug, Clone)]
pub struct KeySource {
    config: KeyConfig,
}

impl KeySource {
    pub fn new(config: KeyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// Resolves the key from configuration
    ///
    /// # Returns
    ///
    /// * `Ok(SigningKey)` - Key resolved for the configured algorithm
    /// * `Err(KeyError)` - Nothing configured, unreadable file, bad format or
    ///   unknown algorithm
    pub fn resolve_key(&self) -> Result<SigningKey, KeyError> {
        if !self.config.is_configured() {
            return Err(KeyError::KeyNotConfigured);
        }
        let algorithm = parse_algorithm(&self.config.algorithm)?;

        let key = match (&self.config.file_path, &self.config.material) {
            (Some(path), _) => load_key_file(path, algorithm)?,
            (None, Some(material)) => decode_material(material, self.config.format, algorithm)?,
            (None, None) => return Err(KeyError::KeyNotConfigured),
        };

        info!(
            algorithm = %key.algorithm_name(),
            fingerprint = %key.fingerprint(),
            kid = ?key.kid(),
            "Resolved signing key"
        );

        Ok(key)
    }
}

fn load_key_file(path: &Path, algorithm: Algorithm) -> Result<SigningKey, KeyError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !matches!(extension.as_str(), "pem" | "json" | "jwk" | "toml") {
        return Err(KeyError::UnsupportedKeyFileType {
            path: path.to_path_buf(),
            extension,
        });
    }

    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => KeyError::KeyFileNotFound {
            path: path.to_path_buf(),
        },
        _ => KeyError::KeyFileUnreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
    })?;

    debug!(path = %path.display(), extension = %extension, "Loading key file");

    match extension.as_str() {
        "pem" => decode_pem(&text, algorithm),
        "toml" => {
            let document: JwkDocument = toml::from_str(&text)
                .map_err(|e| KeyError::invalid(format!("invalid TOML key document: {}", e)))?;
            document.into_signing_key(algorithm)
        }
        _ => decode_jwk_text(&text, algorithm),
    }
}

fn decode_material(
    material: &KeyMaterial,
    format: KeyFormat,
    algorithm: Algorithm,
) -> Result<SigningKey, KeyError> {
    match format {
        KeyFormat::Pem => {
            let text = material
                .as_text()
                .ok_or_else(|| KeyError::invalid("PEM key material must be text"))?;
            decode_pem(text, algorithm)
        }
        KeyFormat::Json => {
            let text = material
                .as_text()
                .ok_or_else(|| KeyError::invalid("JSON key material must be text"))?;
            decode_jwk_text(text, algorithm)
        }
        KeyFormat::Structured => {
            let mapping = material
                .as_mapping()
                .ok_or_else(|| KeyError::invalid("structured key material must be a mapping"))?;
            let document: JwkDocument =
                serde_json::from_value(serde_json::Value::Object(mapping.clone()))
                    .map_err(|e| KeyError::invalid(format!("invalid key members: {}", e)))?;
            document.into_signing_key(algorithm)
        }
    }
}

fn decode_jwk_text(text: &str, algorithm: Algorithm) -> Result<SigningKey, KeyError> {
    let document: JwkDocument = serde_json::from_str(text)
        .map_err(|e| KeyError::invalid(format!("invalid JSON Web Key: {}", e)))?;
    document.into_signing_key(algorithm)
}

/// JSON Web Key members understood by the resolver
///
/// The same members are accepted from JSON text, a configuration mapping
/// or a TOML table.
#[derive(Deserialize)]
struct JwkDocument {
    kty: String,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    k: Option<String>,
    #[serde(default)]
    crv: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    d: Option<String>,
}

impl JwkDocument {
    fn into_signing_key(self, algorithm: Algorithm) -> Result<SigningKey, KeyError> {
        let configured = algorithm_name(algorithm);
        if let Some(alg) = &self.alg {
            if alg != &configured {
                return Err(KeyError::invalid(format!(
                    "key is declared for {} but {} is configured",
                    alg, configured
                )));
            }
        }

        let key = match (KeyFamily::of(algorithm), self.kty.as_str()) {
            (KeyFamily::Symmetric, "oct") => {
                let k = self
                    .k
                    .as_deref()
                    .ok_or_else(|| KeyError::invalid("oct key has no 'k' member"))?;
                SigningKey::from_secret(&decode_b64url(k, "k")?, algorithm)?
            }
            (KeyFamily::Asymmetric, "OKP") if algorithm == Algorithm::EdDSA => {
                match self.crv.as_deref() {
                    Some("Ed25519") => {}
                    other => {
                        return Err(KeyError::invalid(format!(
                            "unsupported OKP curve {:?}",
                            other.unwrap_or("<missing>")
                        )))
                    }
                }
                let d = self
                    .d
                    .as_deref()
                    .ok_or_else(|| KeyError::invalid("OKP key has no private 'd' member"))?;
                let key = SigningKey::from_ed25519_seed(&decode_b64url(d, "d")?)?;

                if let Some(x) = self.x.as_deref() {
                    let declared = decode_b64url(x, "x")?;
                    if fingerprint(&declared) != key.fingerprint() {
                        return Err(KeyError::invalid(
                            "public member 'x' does not match private member 'd'",
                        ));
                    }
                }
                key
            }
            (_, kty) => {
                return Err(KeyError::invalid(format!(
                    "key type '{}' cannot be used with {}",
                    kty, configured
                )))
            }
        };

        Ok(key.with_kid(self.kid))
    }
}

fn decode_b64url(value: &str, member: &str) -> Result<Vec<u8>, KeyError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| KeyError::invalid(format!("member '{}' is not base64url: {}", member, e)))
}

struct PemBlock {
    label: String,
    der: Vec<u8>,
    text: String,
}

impl PemBlock {
    fn is_private(&self) -> bool {
        self.label.ends_with("PRIVATE KEY")
    }

    fn is_public(&self) -> bool {
        self.label.ends_with("PUBLIC KEY") || self.label == "CERTIFICATE"
    }
}

fn parse_pem_blocks(text: &str) -> Result<Vec<PemBlock>, KeyError> {
    let mut blocks = Vec::new();
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

    while let Some(line) = lines.next() {
        let label = match line
            .strip_prefix("-----BEGIN ")
            .and_then(|rest| rest.strip_suffix("-----"))
        {
            Some(label) => label.to_string(),
            None => continue,
        };

        let end = format!("-----END {}-----", label);
        let mut body = String::new();
        let mut terminated = false;
        for line in lines.by_ref() {
            if line == end {
                terminated = true;
                break;
            }
            body.push_str(line);
        }
        if !terminated {
            return Err(KeyError::invalid(format!("PEM block '{}' is not terminated", label)));
        }

        let der = STANDARD
            .decode(&body)
            .map_err(|e| KeyError::invalid(format!("PEM block '{}' is not base64: {}", label, e)))?;
        let text = format!("-----BEGIN {}-----\n{}\n{}\n", label, body, end);
        blocks.push(PemBlock { label, der, text });
    }

    if blocks.is_empty() {
        return Err(KeyError::invalid("no PEM block found"));
    }
    Ok(blocks)
}

fn decode_pem(text: &str, algorithm: Algorithm) -> Result<SigningKey, KeyError> {
    let blocks = parse_pem_blocks(text)?;

    if KeyFamily::of(algorithm) == KeyFamily::Symmetric {
        return SigningKey::from_secret(&blocks[0].der, algorithm);
    }

    let private = blocks
        .iter()
        .find(|block| block.is_private())
        .ok_or_else(|| KeyError::invalid("PEM material has no private key block"))?;
    let public = blocks.iter().find(|block| block.is_public());

    let pem_error = |half: &str, e: jsonwebtoken::errors::Error| {
        KeyError::invalid(format!("invalid {} key for {}: {}", half, algorithm_name(algorithm), e))
    };

    let (encoding_key, decoding_key, verification_material) = match algorithm {
        Algorithm::EdDSA => {
            let encoding_key = EncodingKey::from_ed_pem(private.text.as_bytes())
                .map_err(|e| pem_error("private", e))?;
            match public {
                // Raw key bytes trail the SPKI structure.
                Some(public) => (
                    encoding_key,
                    DecodingKey::from_ed_pem(public.text.as_bytes())
                        .map_err(|e| pem_error("public", e))?,
                    public.der[public.der.len().saturating_sub(ED25519_KEY_LENGTH)..].to_vec(),
                ),
                None => {
                    let seed = ed25519_seed_from_pkcs8(&private.der)?;
                    let derived = SigningKey::from_ed25519_seed(seed)?;
                    debug!("Derived Ed25519 public key from private key");
                    return Ok(derived);
                }
            }
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => {
            let public = public.ok_or_else(|| {
                KeyError::invalid("PEM material has no public key block for RSA verification")
            })?;
            (
                EncodingKey::from_rsa_pem(private.text.as_bytes())
                    .map_err(|e| pem_error("private", e))?,
                DecodingKey::from_rsa_pem(public.text.as_bytes())
                    .map_err(|e| pem_error("public", e))?,
                public.der.clone(),
            )
        }
        _ => {
            let public = public.ok_or_else(|| {
                KeyError::invalid("PEM material has no public key block for EC verification")
            })?;
            (
                EncodingKey::from_ec_pem(private.text.as_bytes())
                    .map_err(|e| pem_error("private", e))?,
                DecodingKey::from_ec_pem(public.text.as_bytes())
                    .map_err(|e| pem_error("public", e))?,
                public.der.clone(),
            )
        }
    };

    Ok(SigningKey {
        algorithm,
        family: KeyFamily::Asymmetric,
        encoding_key,
        decoding_key,
        kid: None,
        fingerprint: fingerprint(&verification_material),
    })
}

fn ed25519_seed_from_pkcs8(der: &[u8]) -> Result<&[u8], KeyError> {
    match der.strip_prefix(&ED25519_PKCS8_PREFIX[..]) {
        Some(seed) if seed.len() == ED25519_KEY_LENGTH => Ok(seed),
        _ => Err(KeyError::invalid(
            "private key is not an Ed25519 PKCS#8 key and no public key block is present",
        )),
    }
}

fn fingerprint(material: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(material));
    digest[..16].to_string()
}
