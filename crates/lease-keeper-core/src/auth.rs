//! Tenant API key management.
//!
//! Keys are bearer tokens of the form `{key_id}.{secret}`:
//! - `key_id`: 8 random bytes, URL-safe base64 without padding, used for lookup
//! - `secret`: 16 random bytes, URL-safe base64 without padding
//!
//! Only the SHA-256 digest of the secret is retained. Validation recomputes
//! the digest and compares it in constant time. The plaintext token exists
//! only in the [`IssuedKey`] returned at creation.

use crate::{fill_random, EntropyError, KeyId, TenantId};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use subtle::ConstantTimeEq;
use tracing::{debug, info};
use zeroize::Zeroizing;

const SECRET_BYTES: usize = 16;

// Regenerating an id that collides with an existing key keeps one key from
// silently replacing another.
const MAX_KEY_ID_ATTEMPTS: usize = 8;

// ============================================================================
// Types
// ============================================================================

/// Plaintext bearer token, shown to the caller exactly once
///
/// The buffer is zeroized on drop and never appears in Debug output.
#[derive(Clone)]
pub struct ApiToken(Zeroizing<String>);

impl ApiToken {
    /// Get the token for immediate use (response body, request header)
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiToken")
            .field("length", &self.0.len())
            .field("value", &"<REDACTED>")
            .finish()
    }
}

/// A freshly created key
#[derive(Debug, Clone)]
pub struct IssuedKey {
    pub key_id: KeyId,
    pub tenant: TenantId,
    pub token: ApiToken,
}

/// Identity established by a valid token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key_id: KeyId,
    pub tenant: TenantId,
}

/// Stored form of a key: the digest, never the secret
#[derive(Clone)]
struct KeyRecord {
    tenant: TenantId,
    secret_hash: [u8; 32],
}

/// Errors that can occur during key management
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Malformed API key")]
    MalformedToken,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("API key not found: {key_id}")]
    KeyNotFound { key_id: KeyId },

    #[error("Failed to generate API key: {0}")]
    Generation(#[from] EntropyError),
}

impl From<AuthError> for crate::BrokerError {
    fn from(error: AuthError) -> Self {
        match error {
            // Malformed and unknown tokens are indistinguishable to callers
            AuthError::MalformedToken | AuthError::InvalidKey => Self::Unauthorized {
                reason: "invalid API key".to_string(),
            },
            AuthError::KeyNotFound { key_id } => Self::KeyNotFound {
                key_id: key_id.to_string(),
            },
            AuthError::Generation(e) => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

// ============================================================================
// Key Store Interface
// ============================================================================

/// Interface for issuing and checking tenant API keys
#[async_trait]
pub trait TenantKeyStore: Send + Sync {
    /// Issue a new key bound to `tenant`
    async fn create_key(&self, tenant: &TenantId) -> Result<IssuedKey, AuthError>;

    /// Resolve a bearer token to the identity it was issued for
    async fn validate_key(&self, token: &str) -> Result<Credentials, AuthError>;

    /// Revoke a key so that subsequent validations fail
    async fn revoke_key(&self, key_id: &KeyId) -> Result<(), AuthError>;

    /// Tenant a key belongs to, if the key exists
    async fn key_tenant(&self, key_id: &KeyId) -> Option<TenantId>;
}

// ============================================================================
// In-Memory Key Store
// ============================================================================

/// Process-local key store; keys do not survive a restart
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<KeyId, KeyRecord>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active keys
    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for InMemoryKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryKeyStore")
            .field("keys", &self.len())
            .finish()
    }
}

fn hash_secret(secret: &[u8]) -> [u8; 32] {
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&Sha256::digest(secret));
    digest
}

#[async_trait]
impl TenantKeyStore for InMemoryKeyStore {
    async fn create_key(&self, tenant: &TenantId) -> Result<IssuedKey, AuthError> {
        let mut secret = Zeroizing::new([0u8; SECRET_BYTES]);
        fill_random(&mut secret[..])?;
        let secret_hash = hash_secret(&secret[..]);

        let key_id = {
            let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);

            let mut key_id = KeyId::generate()?;
            let mut attempts = 1;
            while keys.contains_key(&key_id) {
                if attempts >= MAX_KEY_ID_ATTEMPTS {
                    return Err(AuthError::Generation(EntropyError {
                        message: "could not generate a unique key id".to_string(),
                    }));
                }
                key_id = KeyId::generate()?;
                attempts += 1;
            }

            keys.insert(
                key_id.clone(),
                KeyRecord {
                    tenant: tenant.clone(),
                    secret_hash,
                },
            );
            key_id
        };

        let token = ApiToken(Zeroizing::new(format!(
            "{}.{}",
            key_id,
            URL_SAFE_NO_PAD.encode(&secret[..])
        )));

        info!(tenant = %tenant, key_id = %key_id, "Created API key");

        Ok(IssuedKey {
            key_id,
            tenant: tenant.clone(),
            token,
        })
    }

    async fn validate_key(&self, token: &str) -> Result<Credentials, AuthError> {
        let (key_id, encoded_secret) = token.split_once('.').ok_or(AuthError::MalformedToken)?;
        let key_id: KeyId = key_id.parse().map_err(|_| AuthError::MalformedToken)?;
        let secret = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(encoded_secret)
                .map_err(|_| AuthError::MalformedToken)?,
        );

        let record = self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key_id)
            .cloned();

        let Some(record) = record else {
            debug!(key_id = %key_id, "Unknown API key id");
            return Err(AuthError::InvalidKey);
        };

        let presented = hash_secret(&secret[..]);
        if !bool::from(presented[..].ct_eq(&record.secret_hash[..])) {
            debug!(key_id = %key_id, "API key secret mismatch");
            return Err(AuthError::InvalidKey);
        }

        Ok(Credentials {
            key_id,
            tenant: record.tenant,
        })
    }

    async fn revoke_key(&self, key_id: &KeyId) -> Result<(), AuthError> {
        let removed = self
            .keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key_id);

        match removed {
            Some(record) => {
                info!(tenant = %record.tenant, key_id = %key_id, "Revoked API key");
                Ok(())
            }
            None => Err(AuthError::KeyNotFound {
                key_id: key_id.clone(),
            }),
        }
    }

    async fn key_tenant(&self, key_id: &KeyId) -> Option<TenantId> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key_id)
            .map(|record| record.tenant.clone())
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
