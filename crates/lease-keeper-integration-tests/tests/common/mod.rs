//! Common test utilities for lease-keeper integration tests
//!
//! This module provides:
//! - Router-level helpers driven through `tower::ServiceExt::oneshot`
//! - A `TestServer` that serves the router on an ephemeral local port

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use lease_keeper_api::{create_router, serve, AppState, ServiceConfig};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower::ServiceExt;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration with short leases so expiry paths run quickly under paused time
pub fn fast_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.broker.lease_duration_seconds = 1;
    config.broker.reclaim_interval_seconds = 1;
    config.broker.max_delivery_count = 2;
    config.broker.claim_wait_seconds = 1;
    config
}

pub fn create_test_app_state(config: ServiceConfig) -> AppState {
    AppState::from_config(config).expect("test configuration should be valid")
}

// ============================================================================
// Router Client
// ============================================================================

/// Drives a router in-process, one request at a time
#[derive(Clone)]
pub struct RouterClient {
    state: AppState,
}

impl RouterClient {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn create_key(&self, tenant: &str) -> String {
        let (status, body) = self
            .send(request(
                Method::POST,
                &format!("/create_key?tenant={}", tenant),
                None,
                Body::empty(),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "create_key failed: {}", body);
        body["api_key"].as_str().unwrap().to_string()
    }

    pub async fn publish(&self, token: &str, queue: &str, payload: &str) -> (StatusCode, Value) {
        self.send(request(
            Method::POST,
            &format!("/publish?queue={}", queue),
            Some(token),
            Body::from(payload.to_string()),
        ))
        .await
    }

    pub async fn claim(&self, token: &str, queue: &str) -> (StatusCode, Value) {
        self.send(request(
            Method::POST,
            &format!("/claim?queue={}", queue),
            Some(token),
            Body::empty(),
        ))
        .await
    }

    pub async fn ack(&self, token: &str, queue: &str, message_id: &str) -> (StatusCode, Value) {
        self.send(request(
            Method::POST,
            &format!("/ack?queue={}&message_id={}", queue, message_id),
            Some(token),
            Body::empty(),
        ))
        .await
    }

    pub async fn stats(&self, token: &str, queue: &str) -> (StatusCode, Value) {
        self.send(request(
            Method::GET,
            &format!("/stats?queue={}", queue),
            Some(token),
            Body::empty(),
        ))
        .await
    }

    pub async fn revoke_key(&self, token: &str, key_id: &str) -> (StatusCode, Value) {
        self.send(request(
            Method::POST,
            &format!("/revoke_key?key_id={}", key_id),
            Some(token),
            Body::empty(),
        ))
        .await
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("ApiKey {}", token));
    }
    builder.body(body).unwrap()
}

/// Key id portion of an issued token
pub fn key_id_of(token: &str) -> &str {
    token.split_once('.').map(|(id, _)| id).unwrap_or(token)
}

/// Assert the stats body matches the expected counts
pub fn assert_stats(body: &Value, pending: u64, in_flight: u64, dead_letter: u64) {
    assert_eq!(body["pending"], pending, "pending mismatch in {}", body);
    assert_eq!(body["in_flight"], in_flight, "in_flight mismatch in {}", body);
    assert_eq!(body["dead_letter"], dead_letter, "dead_letter mismatch in {}", body);
}

// ============================================================================
// Test Server
// ============================================================================

/// A server bound to an ephemeral port, shut down on drop
pub struct TestServer {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start(config: ServiceConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let state = create_test_app_state(config);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            serve(listener, state, shutdown)
                .await
                .expect("server should shut down cleanly");
        });

        Self {
            base_url: format!("http://{}", address),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Signal shutdown and wait for the server task to finish
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.unwrap();
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("Failed to build HTTP client")
}
