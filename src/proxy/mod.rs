// src/proxy/mod.rs
mod backend;
mod forwarder;
mod pool;
#[allow(clippy::module_inception)]
mod proxy;

pub use backend::{Backend, BackendStatus, LoadGuard};
pub use forwarder::Forwarder;
pub use pool::BackendPool;
pub use proxy::{Proxy, ProxyError};
