//! Request handlers for the broker endpoints.
//!
//! All endpoints accept any HTTP method and take their inputs from the query
//! string; `/publish` additionally reads the raw request body as the payload.
//! Bearer-authenticated handlers check for the `Authorization` header before
//! looking at parameters.

use crate::errors::ApiError;
use crate::responses::{
    AckParams, ClaimResponse, CreateKeyParams, CreateKeyResponse, HealthResponse, PublishResponse,
    QueueParams, RevokeKeyParams, StatusResponse,
};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use lease_keeper_core::{QueueStats, Timestamp};
use tracing::{error, instrument};

const API_KEY_SCHEME: &str = "ApiKey ";

/// Extract the token from an `Authorization: ApiKey <token>` header
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(API_KEY_SCHEME))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn bearer_token<'a>(state: &AppState, headers: &'a HeaderMap) -> Result<&'a str, ApiError> {
    extract_api_key(headers).ok_or_else(|| {
        state.metrics.auth_failures_total.inc();
        ApiError::MissingApiKey
    })
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingParameter { name })
}

/// Issue a new API key for a tenant (unauthenticated)
#[instrument(skip_all)]
pub async fn create_key(
    State(state): State<AppState>,
    Query(params): Query<CreateKeyParams>,
) -> Result<Json<CreateKeyResponse>, ApiError> {
    let tenant = required(params.tenant, "tenant")?;
    let issued = state.track(state.broker.create_key(&tenant).await)?;

    Ok(Json(CreateKeyResponse {
        tenant: issued.tenant.to_string(),
        api_key: issued.token.expose_secret().to_string(),
    }))
}

/// Publish the request body to a queue
#[instrument(skip_all, fields(queue = tracing::field::Empty))]
pub async fn publish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<QueueParams>,
    body: Bytes,
) -> Result<Json<PublishResponse>, ApiError> {
    let token = bearer_token(&state, &headers)?;
    let queue = required(params.queue, "queue")?;
    tracing::Span::current().record("queue", queue.as_str());

    let message_id = state.track(state.broker.publish(token, &queue, body).await)?;
    state.metrics.messages_published_total.inc();

    Ok(Json(PublishResponse {
        message_id: message_id.to_string(),
    }))
}

/// Claim the next message, waiting up to the configured claim window
#[instrument(skip_all, fields(queue = tracing::field::Empty))]
pub async fn claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<QueueParams>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let token = bearer_token(&state, &headers)?;
    let queue = required(params.queue, "queue")?;
    tracing::Span::current().record("queue", queue.as_str());

    let wait = state.config.broker.claim_wait();
    let message = state.track(state.broker.claim(token, &queue, wait).await)?;
    state.metrics.messages_claimed_total.inc();

    Ok(Json(ClaimResponse {
        message_id: message.id().to_string(),
        payload: String::from_utf8_lossy(message.payload()).into_owned(),
    }))
}

/// Acknowledge an in-flight message
#[instrument(skip_all, fields(queue = tracing::field::Empty))]
pub async fn ack(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AckParams>,
) -> Result<Json<StatusResponse>, ApiError> {
    let token = bearer_token(&state, &headers)?;
    let queue = required(params.queue, "queue")?;
    let message_id = required(params.message_id, "message_id")?;
    tracing::Span::current().record("queue", queue.as_str());

    state.track(state.broker.ack(token, &queue, &message_id).await)?;
    state.metrics.messages_acked_total.inc();

    Ok(Json(StatusResponse::ok()))
}

/// Report collection sizes for a queue
#[instrument(skip_all, fields(queue = tracing::field::Empty))]
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<QueueParams>,
) -> Result<Json<QueueStats>, ApiError> {
    let token = bearer_token(&state, &headers)?;
    let queue = required(params.queue, "queue")?;
    tracing::Span::current().record("queue", queue.as_str());

    let stats = state.track(state.broker.stats(token, &queue).await)?;
    Ok(Json(stats))
}

/// Revoke one of the caller's own API keys
#[instrument(skip_all)]
pub async fn revoke_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RevokeKeyParams>,
) -> Result<Json<StatusResponse>, ApiError> {
    let token = bearer_token(&state, &headers)?;
    let key_id = required(params.key_id, "key_id")?;

    state.track(state.broker.revoke_key(token, &key_id).await)?;
    Ok(Json(StatusResponse::ok()))
}

/// Liveness check
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queues: state.broker.registry().len(),
    })
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
