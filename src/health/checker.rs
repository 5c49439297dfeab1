// src/health/checker.rs
use super::probe::{Probe, ProbeResult};
use crate::metrics::MetricsCollector;
use crate::proxy::{Backend, BackendPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Runs one independent probe loop per backend so a slow or dead backend
/// never delays the checks of the others. Results are published only by
/// flipping each backend's health flag.
pub struct HealthChecker {
    interval: Duration,
    pool: BackendPool,
    probe: Arc<dyn Probe>,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HealthChecker {
    pub fn new(
        interval: Duration,
        pool: BackendPool,
        probe: Arc<dyn Probe>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            interval,
            pool,
            probe,
            metrics,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Spawn the per-backend monitor tasks.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            "Starting health checker for {} backends with interval: {:?}",
            self.pool.len(),
            self.interval
        );

        if let Some(metrics) = &self.metrics {
            metrics.update_backend_counts(self.pool.healthy_count(), self.pool.len());
        }

        self.pool
            .list()
            .iter()
            .cloned()
            .map(|backend| tokio::spawn(self.clone().monitor(backend)))
            .collect()
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn monitor(self: Arc<Self>, backend: Arc<Backend>) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        // First probe after one full interval, then at a steady cadence.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = async {
                    ticker.tick().await;
                    self.check_backend(&backend).await;
                } => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Health monitor for {} stopped", backend.addr);
    }

    /// Probe `backend` once and record the outcome.
    pub async fn check_backend(&self, backend: &Backend) -> ProbeResult {
        let result = self.probe.check(backend).await;
        let healthy = result.is_healthy();
        let changed = backend.record_probe(healthy);

        debug!(
            "{}: healthy? {}, connections: {}",
            backend.addr,
            healthy,
            backend.load()
        );

        if changed {
            match &result {
                ProbeResult::Healthy => info!("Backend {} is now healthy", backend.addr),
                ProbeResult::Unhealthy(reason) => {
                    warn!("Backend {} is now unhealthy: {}", backend.addr, reason)
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.update_backend_health(&backend.addr, healthy);
            metrics.update_backend_counts(self.pool.healthy_count(), self.pool.len());
        }

        result
    }
}
