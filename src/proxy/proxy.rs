// ────────────────────────────────
// src/proxy/proxy.rs
// Proxy component that handles HTTP request forwarding
// ────────────────────────────────

use super::forwarder::Forwarder;
use super::pool::BackendPool;
use crate::config::Config;
use crate::load_balancer::{LeastConnections, LoadBalancer, NoHealthyBackend};
use crate::metrics::MetricsCollector;
use hyper::{Body, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

pub struct Proxy {
    pool: BackendPool,
    balancer: Arc<dyn LoadBalancer>,
    forwarder: Forwarder,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Proxy {
    pub fn new(config: &Config, pool: BackendPool, metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self {
            pool,
            balancer: Arc::new(LeastConnections::new()),
            forwarder: Forwarder::new(config),
            metrics,
        }
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    /// Select a backend and forward `req` to it. Failures are terminal for
    /// this request only; nothing is retried against another backend.
    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let span = info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %req.method(),
            path = %req.uri().path(),
        );

        async move {
            let backend = self.balancer.select_backend(self.pool.list()).map_err(|e| {
                warn!("{}", e);
                ProxyError::from(e)
            })?;

            let result = self.forwarder.forward(&backend, req).await;

            if let Some(metrics) = &self.metrics {
                let status = match &result {
                    Ok(resp) => resp.status(),
                    Err(e) => e.status(),
                };
                metrics.record_request(&backend.addr, status.as_u16());
            }

            result
        }
        .instrument(span)
        .await
    }
}

// Custom error type for proxy operations
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No healthy backends available")]
    NoHealthyBackend,

    #[error("Backend {backend} unreachable: {reason}")]
    BackendUnreachable { backend: String, reason: String },

    #[error("Request to backend {backend} timed out")]
    Timeout { backend: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Response stream failed: {0}")]
    Stream(String),
}

impl From<NoHealthyBackend> for ProxyError {
    fn from(_: NoHealthyBackend) -> Self {
        ProxyError::NoHealthyBackend
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoHealthyBackend
            | ProxyError::BackendUnreachable { .. }
            | ProxyError::Timeout { .. }
            | ProxyError::Stream(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

// Convert ProxyError to Hyper Response for error handling
impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let mut resp = Response::new(Body::from(err.to_string()));
        *resp.status_mut() = err.status();
        resp
    }
}
