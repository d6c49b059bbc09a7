//! # Lease-Keeper Core
//!
//! Core logic for the Lease-Keeper multi-tenant message broker.
//!
//! This crate contains the queue engine and its collaborators:
//! - [`queue`] - per-queue engine with pending, in-flight and dead-letter
//!   collections, blocking claim and background lease reclamation
//! - [`registry`] - lazily populated map from qualified queue names to engines
//! - [`auth`] - tenant API key issuing, validation and revocation
//! - [`broker`] - the authenticated, tenant-scoped facade used by transports
//! - [`config`] - broker-wide queue configuration
//!
//! ## Usage
//!
//! ```rust
//! use lease_keeper_core::{QualifiedQueueName, QueueName, TenantId};
//!
//! let tenant = TenantId::new("acme").unwrap();
//! let queue = QueueName::new("orders").unwrap();
//! let qualified = QualifiedQueueName::new(&tenant, &queue);
//!
//! assert_eq!(qualified.as_str(), "acme:orders");
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod auth;
pub mod broker;
pub mod config;
pub mod queue;
pub mod registry;

pub use auth::{ApiToken, AuthError, Credentials, InMemoryKeyStore, IssuedKey, TenantKeyStore};
pub use broker::TenantBroker;
pub use config::BrokerConfig;
pub use queue::{Message, QueueEngine, QueueSettings, QueueStats, ReclaimOutcome};
pub use registry::QueueRegistry;

/// Standard result type for broker operations
pub type BrokerResult<T> = Result<T, BrokerError>;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Tenant identifier used to namespace queues
///
/// Tenant IDs never contain `:`, which keeps the qualified queue name
/// `{tenant}:{queue}` unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Maximum tenant ID length
    pub const MAX_LENGTH: usize = 128;

    /// Create new tenant ID with validation
    ///
    /// # Validation Rules
    /// - Must be 1-128 characters
    /// - Must contain only ASCII alphanumerics, hyphens, underscores and periods
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "tenant".to_string(),
            });
        }

        if value.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "tenant".to_string(),
                max_length: Self::MAX_LENGTH,
            });
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(ValidationError::InvalidCharacters {
                field: "tenant".to_string(),
                invalid_chars: "only ASCII alphanumerics, '-', '_' and '.' are allowed"
                    .to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Logical queue name as supplied by a tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Maximum queue name length
    pub const MAX_LENGTH: usize = 260;

    /// Create new queue name with validation
    ///
    /// # Validation Rules
    /// - Must be 1-260 characters
    /// - Must not contain whitespace or control characters
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "queue".to_string(),
            });
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "queue".to_string(),
                max_length: Self::MAX_LENGTH,
            });
        }

        if name.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ValidationError::InvalidCharacters {
                field: "queue".to_string(),
                invalid_chars: "whitespace or control characters".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Fully-qualified, tenant-scoped queue name
///
/// Format: `{tenant}:{queue}`. This is the key the registry stores queues
/// under; two tenants using the same logical name never share a queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QualifiedQueueName(String);

impl QualifiedQueueName {
    /// Scope a queue name to a tenant
    pub fn new(tenant: &TenantId, queue: &QueueName) -> Self {
        Self(format!("{}:{}", tenant, queue))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tenant portion of the name
    pub fn tenant(&self) -> &str {
        self.0.split_once(':').map(|(tenant, _)| tenant).unwrap_or("")
    }

    /// Queue portion of the name
    pub fn queue(&self) -> &str {
        self.0.split_once(':').map(|(_, queue)| queue).unwrap_or("")
    }
}

impl fmt::Display for QualifiedQueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a published message
///
/// 16 bytes from the operating system's CSPRNG, URL-safe base64 without
/// padding. Ids are handed to clients for acks, so they must not be guessable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    const RANDOM_BYTES: usize = 16;

    /// Generate a new random message ID
    pub fn generate() -> Result<Self, EntropyError> {
        let mut bytes = [0u8; Self::RANDOM_BYTES];
        fill_random(&mut bytes)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Public identifier of an API key (the part of the token before the `.`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyId(String);

impl KeyId {
    const RANDOM_BYTES: usize = 8;

    /// Generate a new random key ID
    pub fn generate() -> Result<Self, EntropyError> {
        let mut bytes = [0u8; Self::RANDOM_BYTES];
        fill_random(&mut bytes)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for KeyId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "key_id".to_string(),
            });
        }

        if s.contains('.') {
            return Err(ValidationError::InvalidCharacters {
                field: "key_id".to_string(),
                invalid_chars: "'.'".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC wall-clock timestamp
///
/// Used for informational times such as a message's publish time. Lease
/// deadlines use the monotonic clock instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ============================================================================
// Randomness
// ============================================================================

/// The operating system's random number source failed
#[derive(Debug, thiserror::Error)]
#[error("Entropy source unavailable: {message}")]
pub struct EntropyError {
    message: String,
}

/// Fill `buf` from the OS CSPRNG, surfacing failures instead of panicking
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<(), EntropyError> {
    OsRng.try_fill_bytes(buf).map_err(|e| EntropyError {
        message: e.to_string(),
    })
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },

    #[error("Value out of range for '{field}': {message}")]
    OutOfRange { field: String, message: String },
}

/// Top-level error type for broker operations
///
/// Each variant corresponds to one outcome class a transport has to map:
/// - `Unauthorized`: missing, invalid or revoked API key
/// - `Validation`: bad input, rejected before any side effect
/// - `Timeout`: no message became available within the claim window
/// - `MessageNotFound`: ack for a message that is not in flight
/// - `KeyNotFound`: revocation of an unknown key
/// - `Internal`: entropy failure or other unexpected condition
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("No message available within {waited:?}")]
    Timeout { waited: Duration },

    #[error("Message not in flight: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("API key not found: {key_id}")]
    KeyNotFound { key_id: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BrokerError {
    /// Check if the caller should simply try the operation again
    ///
    /// Only a claim timeout qualifies: it is an expected outcome and a new
    /// claim may find work. Internal errors are not retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Unauthorized { .. } => false,
            Self::Validation(_) => false,
            Self::MessageNotFound { .. } => false,
            Self::KeyNotFound { .. } => false,
            Self::Internal { .. } => false,
        }
    }

    /// Check if the error was caused by the caller's input or credentials
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }
}

impl From<EntropyError> for BrokerError {
    fn from(error: EntropyError) -> Self {
        Self::Internal {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
