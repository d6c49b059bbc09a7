//! Response types and query parameters for the API.

use lease_keeper_core::Timestamp;
use serde::{Deserialize, Serialize};

// ============================================================================
// Response Types
// ============================================================================

/// Key creation response; the only time the token is returned
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateKeyResponse {
    pub tenant: String,
    pub api_key: String,
}

/// Publish response
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    pub message_id: String,
}

/// Claim response
///
/// The payload is rendered as text; invalid UTF-8 sequences are replaced
/// with U+FFFD.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClaimResponse {
    pub message_id: String,
    pub payload: String,
}

/// Generic acknowledgement for operations with no other result
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
    pub queues: usize,
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Parameters for `/create_key`
#[derive(Debug, Default, Deserialize)]
pub struct CreateKeyParams {
    pub tenant: Option<String>,
}

/// Parameters for `/publish`, `/claim` and `/stats`
#[derive(Debug, Default, Deserialize)]
pub struct QueueParams {
    pub queue: Option<String>,
}

/// Parameters for `/ack`
#[derive(Debug, Default, Deserialize)]
pub struct AckParams {
    pub queue: Option<String>,
    pub message_id: Option<String>,
}

/// Parameters for `/revoke_key`
#[derive(Debug, Default, Deserialize)]
pub struct RevokeKeyParams {
    pub key_id: Option<String>,
}
