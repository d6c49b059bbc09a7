//! Prometheus metrics for the API service.
//!
//! Metrics live in a per-instance [`Registry`] rather than the process-wide
//! default, so several routers (one per test, for example) can coexist.

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    // HTTP request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,

    // Broker operation metrics
    pub messages_published_total: IntCounter,
    pub messages_claimed_total: IntCounter,
    pub messages_acked_total: IntCounter,
    pub claim_timeouts_total: IntCounter,

    // Security metrics
    pub auth_failures_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request processing time",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["method", "path"],
        )?;
        let messages_published_total =
            IntCounter::new("messages_published_total", "Messages accepted by publish")?;
        let messages_claimed_total =
            IntCounter::new("messages_claimed_total", "Messages handed out by claim")?;
        let messages_acked_total =
            IntCounter::new("messages_acked_total", "Messages acknowledged")?;
        let claim_timeouts_total = IntCounter::new(
            "claim_timeouts_total",
            "Claims that found no message within the wait window",
        )?;
        let auth_failures_total = IntCounter::new(
            "auth_failures_total",
            "Requests rejected for a missing or invalid API key",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(messages_published_total.clone()))?;
        registry.register(Box::new(messages_claimed_total.clone()))?;
        registry.register(Box::new(messages_acked_total.clone()))?;
        registry.register(Box::new(claim_timeouts_total.clone()))?;
        registry.register(Box::new(auth_failures_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            http_requests_total,
            http_request_duration,
            messages_published_total,
            messages_claimed_total,
            messages_acked_total,
            claim_timeouts_total,
            auth_failures_total,
        }))
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: Duration) {
        self.http_requests_total
            .with_label_values(&[method, path, &status.to_string()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method, path])
            .observe(duration.as_secs_f64());
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
