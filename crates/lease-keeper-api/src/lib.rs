//! # Lease-Keeper HTTP Service
//!
//! HTTP front end for the Lease-Keeper message broker.
//!
//! This service provides:
//! - Key issuing and revocation (`/create_key`, `/revoke_key`)
//! - Queue operations (`/publish`, `/claim`, `/ack`, `/stats`)
//! - Health and Prometheus endpoints (`/health`, `/metrics`)
//!
//! The broker state is constructed explicitly and injected through
//! [`AppState`]; nothing is global.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod responses;

pub use config::{LoggingConfig, ServerConfig, ServiceConfig};
pub use errors::{ApiError, ConfigError, ServiceError};
pub use metrics::ServiceMetrics;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, State},
    middleware,
    response::Response,
    routing::{any, get},
    Router,
};
use lease_keeper_core::{BrokerError, InMemoryKeyStore, QueueRegistry, TenantBroker};
use std::{future::Future, future::IntoFuture, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Authenticated, tenant-scoped queue operations
    pub broker: TenantBroker,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, broker: TenantBroker, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            config: Arc::new(config),
            broker,
            metrics,
        }
    }

    /// Build a broker with an in-memory key store from configuration
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: ServiceConfig) -> Result<Self, ServiceError> {
        config.validate()?;

        let metrics = ServiceMetrics::new().map_err(|e| {
            ServiceError::Configuration(ConfigError::Invalid {
                message: format!("Failed to initialize metrics: {}", e),
            })
        })?;

        let registry = Arc::new(QueueRegistry::new(config.broker.queue_settings()));
        let broker = TenantBroker::new(registry, Arc::new(InMemoryKeyStore::new()));

        Ok(Self::new(config, broker, metrics))
    }

    /// Count auth failures and claim timeouts, then convert for the response
    pub(crate) fn track<T>(&self, result: Result<T, BrokerError>) -> Result<T, ApiError> {
        result.map_err(|error| {
            match &error {
                BrokerError::Unauthorized { .. } => self.metrics.auth_failures_total.inc(),
                BrokerError::Timeout { .. } => self.metrics.claim_timeouts_total.inc(),
                _ => {}
            }
            ApiError::from(error)
        })
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let broker_routes = Router::new()
        .route("/create_key", any(handlers::create_key))
        .route("/revoke_key", any(handlers::revoke_key))
        .route("/publish", any(handlers::publish))
        .route("/claim", any(handlers::claim))
        .route("/ack", any(handlers::ack))
        .route("/stats", any(handlers::stats));

    let observability_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics));

    let mut router = Router::new()
        .merge(broker_routes)
        .merge(observability_routes)
        // Payload size is unbounded
        .layer(DefaultBodyLimit::disable());

    if state.config.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .into_inner(),
        )
        .with_state(state)
}

/// Bind the configured address and serve until SIGINT/SIGTERM
pub async fn start_server(config: ServiceConfig) -> Result<(), ServiceError> {
    let address = config.server.bind_address();
    let state = AppState::from_config(config)?;

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Starting HTTP server");

    serve(listener, state, shutdown_signal()).await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Serve on an already bound listener until `shutdown` resolves
///
/// After the shutdown future completes no new connections are accepted.
/// In-flight requests get `server.shutdown_timeout_seconds` to finish;
/// whatever is still running after that is dropped.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown_timeout = Duration::from_secs(state.config.server.shutdown_timeout_seconds);
    let app = create_router(state);

    let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
    let graceful = async move {
        shutdown.await;
        let _ = started_tx.send(());
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            return result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            });
        }
        Ok(()) = started_rx => {}
    }

    match tokio::time::timeout(shutdown_timeout, server).await {
        Ok(result) => result.map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        }),
        Err(_) => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out, dropping remaining connections"
            );
            Ok(())
        }
    }
}

/// Resolve on SIGINT (Ctrl+C) or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses an incoming `x-correlation-id` header or generates a UUID, echoes
/// it on the response and logs completion at a level matching the status
/// class. Query strings are not logged.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    path = %request.uri().path(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

/// Record request count and latency per matched route
///
/// Unmatched paths share a single label to keep cardinality bounded.
async fn metrics_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let start = std::time::Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    state
        .metrics
        .record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
