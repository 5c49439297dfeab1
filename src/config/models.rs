// src/config/models.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Backends the balancer routes to when the config file does not name any.
pub const DEFAULT_BACKENDS: [&str; 3] = ["server1:8080", "server2:8080", "server3:8080"];

/// Upper bound for every configured timeout and interval (one day).
pub const MAX_DURATION_SECS: u64 = 86_400;

/// Header carrying the serving backend's address when tracing is enabled.
pub const TRACE_HEADER: &str = "lb-from";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the balancer accepts client traffic on.
    pub port: u16,
    /// Deadline for each forwarded request, headers and body included.
    pub timeout_secs: u64,
    /// Talk to backends over https instead of http.
    pub https: bool,
    /// Add the `lb-from` header to proxied responses.
    pub trace: bool,
    /// Fixed, ordered backend set (`host:port`). Order is the tie-break order.
    pub backends: Vec<String>,
    pub health_check: HealthCheckConfig,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8090,
            timeout_secs: 3,
            https: false,
            trace: false,
            backends: DEFAULT_BACKENDS.iter().map(|b| b.to_string()).collect(),
            health_check: HealthCheckConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    pub fn scheme(&self) -> &'static str {
        if self.https {
            "https"
        } else {
            "http"
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backends.is_empty() {
            bail!("at least one backend must be configured");
        }

        let mut seen = HashSet::new();
        for addr in &self.backends {
            if !seen.insert(addr.as_str()) {
                bail!("duplicate backend address: {}", addr);
            }

            let url = Url::parse(&format!("{}://{}", self.scheme(), addr))
                .map_err(|e| anyhow::anyhow!("invalid backend address {:?}: {}", addr, e))?;
            if url.host_str().is_none() || url.path() != "/" || url.query().is_some() {
                bail!("backend address must be host:port, got {:?}", addr);
            }
        }

        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        if self.timeout_secs > MAX_DURATION_SECS {
            bail!("timeout_secs must be at most {}", MAX_DURATION_SECS);
        }

        self.health_check.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub interval_secs: u64,
    pub timeout_secs: u64,
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 3,
            path: "/health".to_string(),
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("health_check.interval_secs must be greater than zero");
        }
        if self.interval_secs > MAX_DURATION_SECS {
            bail!("health_check.interval_secs must be at most {}", MAX_DURATION_SECS);
        }
        if self.timeout_secs == 0 {
            bail!("health_check.timeout_secs must be greater than zero");
        }
        if self.timeout_secs > MAX_DURATION_SECS {
            bail!("health_check.timeout_secs must be at most {}", MAX_DURATION_SECS);
        }
        if !self.path.starts_with('/') {
            bail!("health_check.path must start with '/', got {:?}", self.path);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
            path: "/metrics".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8090);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.health_check.interval(), Duration::from_secs(10));
        assert_eq!(config.backends.len(), 3);
        assert_eq!(config.scheme(), "http");
    }

    #[test]
    fn https_switches_scheme() {
        let config = Config {
            https: true,
            ..Config::default()
        };
        assert_eq!(config.scheme(), "https");
    }

    #[test]
    fn rejects_empty_backends() {
        let config = Config {
            backends: vec![],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_backends() {
        let config = Config {
            backends: vec!["a:1".into(), "a:1".into()],
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_backend_with_path() {
        let config = Config {
            backends: vec!["server1:8080/api".into()],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeouts() {
        let config = Config {
            timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.health_check.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_timeouts() {
        let config = Config {
            timeout_secs: u64::MAX,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.health_check.interval_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.health_check.timeout_secs = MAX_DURATION_SECS + 1;
        assert!(config.validate().is_err());

        let config = Config {
            timeout_secs: MAX_DURATION_SECS,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_relative_health_path() {
        let mut config = Config::default();
        config.health_check.path = "health".into();
        assert!(config.validate().is_err());
    }
}
