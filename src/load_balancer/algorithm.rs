// src/load_balancer/algorithm.rs
use crate::proxy::Backend;
use std::sync::Arc;

/// Returned when every backend in the set is marked unhealthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("No healthy backends available")]
pub struct NoHealthyBackend;

pub trait LoadBalancer: Send + Sync {
    /// Pick the backend the next request should go to.
    fn select_backend(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, NoHealthyBackend>;

    fn name(&self) -> &'static str;
}
