// ────────────────────────────────
// src/proxy/forwarder.rs
// Sends one client request to one chosen backend and streams the answer back.
// ────────────────────────────────
use super::backend::{Backend, LoadGuard};
use super::proxy::ProxyError;
use crate::config::{Config, TRACE_HEADER};
use futures::stream;
use hyper::body::{Bytes, HttpBody};
use hyper::client::HttpConnector;
use hyper::header::{HeaderValue, HOST};
use hyper::{Body, Client, Request, Response, Uri, Version};
use hyper_tls::HttpsConnector;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    scheme: &'static str,
    timeout: Duration,
    trace: bool,
}

impl Forwarder {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder().build(HttpsConnector::new());

        Self {
            client,
            scheme: config.scheme(),
            timeout: config.timeout(),
            trace: config.trace,
        }
    }

    /// Forward `req` to `backend`.
    ///
    /// The backend's load is raised before anything else happens and stays
    /// raised until the returned body has been fully streamed (or dropped).
    /// On a transport error the load is released before returning. The
    /// deadline covers the whole exchange; dropping the returned future or
    /// body cancels the outbound call.
    pub async fn forward(
        &self,
        backend: &Arc<Backend>,
        req: Request<Body>,
    ) -> Result<Response<Body>, ProxyError> {
        let guard = backend.acquire();
        let deadline = Instant::now() + self.timeout;

        let outbound = self.rewrite(backend, req)?;
        let target = outbound.uri().clone();

        let resp = match timeout_at(deadline, self.client.request(outbound)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(backend = %backend.addr, error = %e, "Failed to get response");
                return Err(ProxyError::BackendUnreachable {
                    backend: backend.addr.clone(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(backend = %backend.addr, timeout = ?self.timeout, "Backend timed out");
                return Err(ProxyError::Timeout {
                    backend: backend.addr.clone(),
                });
            }
        };

        debug!(status = %resp.status(), %target, "fwd");

        let (mut parts, body) = resp.into_parts();
        if self.trace {
            if let Ok(value) = HeaderValue::from_str(&backend.addr) {
                parts.headers.insert(TRACE_HEADER, value);
            }
        }

        Ok(Response::from_parts(parts, stream_body(body, deadline, guard)))
    }

    fn rewrite(&self, backend: &Backend, req: Request<Body>) -> Result<Request<Body>, ProxyError> {
        let (mut parts, body) = req.into_parts();

        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        parts.uri = format!("{}://{}{}", self.scheme, backend.addr, path)
            .parse::<Uri>()
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

        let host = HeaderValue::from_str(&backend.addr)
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
        parts.headers.insert(HOST, host);
        parts.version = Version::HTTP_11;

        Ok(Request::from_parts(parts, body))
    }
}

struct Upstream {
    body: Body,
    deadline: Instant,
    _load: LoadGuard,
}

/// Re-wrap the upstream body so each chunk is bounded by the request deadline
/// and the backend's load is held until the last chunk is gone.
fn stream_body(body: Body, deadline: Instant, load: LoadGuard) -> Body {
    let upstream = Upstream {
        body,
        deadline,
        _load: load,
    };

    let chunks = stream::unfold(Some(upstream), |state| async move {
        let Some(mut upstream) = state else {
            return None;
        };
        match timeout_at(upstream.deadline, upstream.body.data()).await {
            Ok(Some(Ok(chunk))) => Some((Ok::<Bytes, ProxyError>(chunk), Some(upstream))),
            Ok(Some(Err(e))) => {
                warn!(error = %e, "Failed to write response");
                Some((Err(ProxyError::Stream(e.to_string())), None))
            }
            Ok(None) => None,
            Err(_) => {
                warn!("Response body exceeded request deadline");
                Some((Err(ProxyError::Stream("deadline exceeded".into())), None))
            }
        }
    });

    Body::wrap_stream(chunks)
}
