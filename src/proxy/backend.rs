// src/proxy/backend.rs
use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A single upstream server.
///
/// `healthy` is written only by the health monitor task that owns this
/// backend; `load` only moves through [`Backend::acquire`] and the guard it
/// returns, so every increment has exactly one matching decrement.
#[derive(Debug)]
pub struct Backend {
    /// `host:port`, also used as the backend's identity.
    pub addr: String,

    healthy: AtomicBool,
    load: AtomicUsize,
    last_probe: ArcSwapOption<DateTime<Utc>>,
}

impl Backend {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            healthy: AtomicBool::new(true),
            load: AtomicUsize::new(0),
            last_probe: ArcSwapOption::empty(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Number of requests currently in flight to this backend.
    pub fn load(&self) -> usize {
        self.load.load(Ordering::Acquire)
    }

    /// Count one more in-flight request until the returned guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> LoadGuard {
        self.load.fetch_add(1, Ordering::AcqRel);
        LoadGuard {
            backend: self.clone(),
        }
    }

    /// Store a probe outcome. Returns true when the health flag flipped.
    pub fn record_probe(&self, healthy: bool) -> bool {
        self.last_probe.store(Some(Arc::new(Utc::now())));
        self.healthy.swap(healthy, Ordering::AcqRel) != healthy
    }

    pub fn last_probe(&self) -> Option<DateTime<Utc>> {
        self.last_probe.load_full().map(|t| *t)
    }

    pub fn status(&self) -> BackendStatus {
        BackendStatus {
            address: self.addr.clone(),
            healthy: self.is_healthy(),
            load: self.load(),
            last_probe: self.last_probe(),
        }
    }
}

/// Holds one unit of a backend's load; releases it on drop.
#[derive(Debug)]
pub struct LoadGuard {
    backend: Arc<Backend>,
}

impl LoadGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.backend.load.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub address: String,
    pub healthy: bool,
    pub load: usize,
    pub last_probe: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_healthy_and_idle() {
        let backend = Backend::new("server1:8080");
        assert!(backend.is_healthy());
        assert_eq!(backend.load(), 0);
        assert!(backend.last_probe().is_none());
    }

    #[test]
    fn guard_releases_load_on_drop() {
        let backend = Arc::new(Backend::new("server1:8080"));

        let first = backend.acquire();
        let second = backend.acquire();
        assert_eq!(backend.load(), 2);

        drop(first);
        assert_eq!(backend.load(), 1);
        drop(second);
        assert_eq!(backend.load(), 0);
    }

    #[test]
    fn record_probe_reports_transitions() {
        let backend = Backend::new("server1:8080");

        assert!(!backend.record_probe(true));
        assert!(backend.record_probe(false));
        assert!(!backend.is_healthy());
        assert!(!backend.record_probe(false));
        assert!(backend.record_probe(true));
        assert!(backend.is_healthy());
        assert!(backend.last_probe().is_some());
    }

    #[test]
    fn health_does_not_touch_load() {
        let backend = Arc::new(Backend::new("server1:8080"));
        let _guard = backend.acquire();

        backend.record_probe(false);
        backend.record_probe(true);

        assert_eq!(backend.status().load, 1);
    }

    #[test]
    fn concurrent_guards_net_to_zero() {
        let backend = Arc::new(Backend::new("server1:8080"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let backend = backend.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        let _guard = backend.acquire();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(backend.load(), 0);
    }
}
