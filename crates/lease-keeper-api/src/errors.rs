//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use lease_keeper_core::BrokerError;
use tracing::{debug, error, warn};

/// Request handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: missing parameters and validation failures
/// - `401 Unauthorized`: missing, malformed, unknown or revoked API key
/// - `404 Not Found`: claim window elapsed, message not in flight, or
///   unknown key on revocation
/// - `500 Internal Server Error`: entropy failure or other unexpected fault
///
/// Every error body is `{"error": "<message>"}`. Internal error details are
/// logged server-side and replaced with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No `Authorization: ApiKey <token>` header
    #[error("Unauthorized: missing API key")]
    MissingApiKey,

    /// Required query parameter absent or empty
    #[error("Missing required parameter: {name}")]
    MissingParameter { name: &'static str },

    /// Failure reported by the broker
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl ApiError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingApiKey => StatusCode::UNAUTHORIZED,
            Self::MissingParameter { .. } => StatusCode::BAD_REQUEST,
            Self::Broker(error) => match error {
                BrokerError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                BrokerError::Validation(_) => StatusCode::BAD_REQUEST,
                BrokerError::Timeout { .. } => StatusCode::NOT_FOUND,
                BrokerError::MessageNotFound { .. } => StatusCode::NOT_FOUND,
                BrokerError::KeyNotFound { .. } => StatusCode::NOT_FOUND,
                BrokerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Broker(error) if !error.is_client_error() => {
                error!(error = %error, "Internal error while handling request");
                "Internal server error occurred".to_string()
            }
            Self::Broker(error) if error.is_transient() => {
                debug!(error = %error, "Claim window elapsed");
                "No message available".to_string()
            }
            Self::MissingApiKey | Self::Broker(BrokerError::Unauthorized { .. }) => {
                warn!(error = %self, "Rejected unauthenticated request");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {message}")]
    Load { message: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
