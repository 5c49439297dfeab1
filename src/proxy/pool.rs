// src/proxy/pool.rs
use super::backend::{Backend, BackendStatus};
use std::sync::Arc;

/// The fixed, ordered backend set shared by the health monitor and the
/// request path. It is never grown or shrunk after construction; a backend
/// leaves rotation only by being marked unhealthy.
#[derive(Debug, Clone)]
pub struct BackendPool {
    backends: Arc<[Arc<Backend>]>,
}

impl BackendPool {
    pub fn new<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backends: Vec<Arc<Backend>> = addrs
            .into_iter()
            .map(|addr| Arc::new(Backend::new(addr)))
            .collect();

        tracing::info!("Backend pool created with {} backends", backends.len());

        Self {
            backends: backends.into(),
        }
    }

    /// All backends in registry order. The order is stable across calls.
    pub fn list(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn healthy_count(&self) -> usize {
        self.backends.iter().filter(|b| b.is_healthy()).count()
    }

    pub fn snapshot(&self) -> Vec<BackendStatus> {
        self.backends.iter().map(|b| b.status()).collect()
    }
}
