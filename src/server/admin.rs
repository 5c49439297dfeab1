// src/server/admin.rs
use crate::metrics::MetricsRegistry;
use crate::proxy::BackendPool;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;

/// Serves `/status` (JSON backend snapshot) and the prometheus endpoint.
#[derive(Clone)]
pub struct AdminHandler {
    registry: Arc<MetricsRegistry>,
    pool: BackendPool,
    metrics_path: Arc<str>,
}

impl AdminHandler {
    pub fn new(registry: Arc<MetricsRegistry>, pool: BackendPool, metrics_path: &str) -> Self {
        Self {
            registry,
            pool,
            metrics_path: metrics_path.into(),
        }
    }

    pub async fn handle(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        let path = req.uri().path();

        let resp = if path == &*self.metrics_path {
            match self.registry.gather(&self.pool) {
                Ok(body) => text(StatusCode::OK, "text/plain; version=0.0.4", body),
                Err(e) => {
                    tracing::error!("Failed to encode metrics: {}", e);
                    text(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "metrics unavailable")
                }
            }
        } else if path == "/status" {
            match serde_json::to_vec(&self.pool.snapshot()) {
                Ok(body) => text(StatusCode::OK, "application/json", body),
                Err(e) => {
                    tracing::error!("Failed to encode status: {}", e);
                    text(StatusCode::INTERNAL_SERVER_ERROR, "text/plain", "status unavailable")
                }
            }
        } else {
            text(StatusCode::NOT_FOUND, "text/plain", "Not Found")
        };

        Ok(resp)
    }
}

fn text(status: StatusCode, content_type: &'static str, body: impl Into<Body>) -> Response<Body> {
    let mut resp = Response::new(body.into());
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}
