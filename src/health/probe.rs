// src/health/probe.rs
use crate::config::Config;
use crate::proxy::Backend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::timeout;

/// Outcome of one health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Healthy,
    Unhealthy(String),
}

impl ProbeResult {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeResult::Healthy)
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, backend: &Backend) -> ProbeResult;
}

/// `GET <scheme>://<addr><path>`; only a 200 within the timeout is healthy.
pub struct HttpProbe {
    client: Client,
    scheme: &'static str,
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(config: &Config) -> Result<Self> {
        let timeout = config.health_check.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create health check HTTP client")?;

        Ok(Self {
            client,
            scheme: config.scheme(),
            path: config.health_check.path.clone(),
            timeout,
        })
    }

    fn url(&self, backend: &Backend) -> String {
        format!("{}://{}{}", self.scheme, backend.addr, self.path)
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, backend: &Backend) -> ProbeResult {
        let result = timeout(self.timeout, self.client.get(self.url(backend)).send()).await;

        match result {
            Ok(Ok(response)) if response.status() == StatusCode::OK => ProbeResult::Healthy,
            Ok(Ok(response)) => ProbeResult::Unhealthy(format!("HTTP {}", response.status())),
            Ok(Err(e)) => ProbeResult::Unhealthy(e.to_string()),
            Err(_) => ProbeResult::Unhealthy("Request timeout".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_config(timeout_secs: u64) -> Config {
        let mut config = Config::default();
        config.health_check.timeout_secs = timeout_secs;
        config
    }

    #[tokio::test]
    async fn ok_status_is_healthy() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .create_async()
            .await;

        let probe = HttpProbe::new(&probe_config(3)).unwrap();
        let backend = Backend::new(server.host_with_port());

        assert_eq!(probe.check(&backend).await, ProbeResult::Healthy);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn other_success_codes_are_unhealthy() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(204)
            .create_async()
            .await;

        let probe = HttpProbe::new(&probe_config(3)).unwrap();
        let backend = Backend::new(server.host_with_port());

        assert_eq!(
            probe.check(&backend).await,
            ProbeResult::Unhealthy("HTTP 204 No Content".into())
        );
    }

    #[tokio::test]
    async fn server_error_is_unhealthy() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(503)
            .create_async()
            .await;

        let probe = HttpProbe::new(&probe_config(3)).unwrap();
        let backend = Backend::new(server.host_with_port());

        assert!(!probe.check(&backend).await.is_healthy());
    }

    #[tokio::test]
    async fn connection_error_is_unhealthy() {
        let probe = HttpProbe::new(&probe_config(1)).unwrap();
        let backend = Backend::new("127.0.0.1:1");

        assert!(!probe.check(&backend).await.is_healthy());
    }

    #[tokio::test]
    async fn url_uses_scheme_and_path() {
        let mut config = probe_config(3);
        config.https = true;
        config.health_check.path = "/ready".into();
        let probe = HttpProbe::new(&config).unwrap();

        assert_eq!(
            probe.url(&Backend::new("server1:8080")),
            "https://server1:8080/ready"
        );
    }
}
