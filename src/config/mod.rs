//! Configuration management
//!
//! Layered sources, lowest priority first: `config/default.toml`,
//! `config/{ENV}.toml`, `config/local.toml`, then `VIGIL__`-prefixed
//! environment variables with `__` separators.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::use_cases::ProbeTimeouts;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub scan: ScanConfig,
    pub probes: ProbeConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Serve Swagger UI at /docs
    pub enable_docs: bool,
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_docs: true,
            request_timeout_seconds: 30,
        }
    }
}

/// Scan admission and retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Global cap on concurrently running scan jobs
    pub max_concurrent_scans: usize,
    /// How long terminal jobs stay visible to status pollers
    pub retention_seconds: u64,
    /// Eviction sweep interval
    pub sweep_interval_seconds: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scans: 5,
            retention_seconds: 600,
            sweep_interval_seconds: 60,
        }
    }
}

impl ScanConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

/// Per-probe budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub http_user_agent: String,
    pub fingerprint_timeout_seconds: u64,
    pub port_scan_timeout_seconds: u64,
    pub certificate_timeout_seconds: u64,
    pub template_timeout_seconds: u64,
    pub cve_lookup_timeout_seconds: u64,
    pub port_connect_timeout_ms: u64,
    pub port_scan_concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            http_user_agent: "vigil-scanner/0.1".to_string(),
            fingerprint_timeout_seconds: 10,
            port_scan_timeout_seconds: 20,
            certificate_timeout_seconds: 10,
            template_timeout_seconds: 15,
            cve_lookup_timeout_seconds: 5,
            port_connect_timeout_ms: 1500,
            port_scan_concurrency: 16,
        }
    }
}

impl ProbeConfig {
    pub fn timeouts(&self) -> ProbeTimeouts {
        ProbeTimeouts {
            fingerprint: Duration::from_secs(self.fingerprint_timeout_seconds),
            port_scan: Duration::from_secs(self.port_scan_timeout_seconds),
            certificate: Duration::from_secs(self.certificate_timeout_seconds),
            templates: Duration::from_secs(self.template_timeout_seconds),
            cve_lookup: Duration::from_secs(self.cve_lookup_timeout_seconds),
        }
    }

    pub fn port_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.port_connect_timeout_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Error raised when loaded configuration is internally inconsistent.
#[derive(Debug, thiserror::Error)]
#[error("configuration validation error: {0}")]
pub struct ValidationError(String);

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigLoadError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false));

        if let Ok(env) = std::env::var("ENV") {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{}", env)).required(false));
        }

        builder = builder
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("VIGIL").separator("__"));

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.scan.max_concurrent_scans == 0 {
            return Err(ValidationError(
                "scan.max_concurrent_scans must be > 0".into(),
            ));
        }
        if self.scan.retention_seconds == 0 {
            return Err(ValidationError("scan.retention_seconds must be > 0".into()));
        }
        if self.scan.sweep_interval_seconds == 0 {
            return Err(ValidationError(
                "scan.sweep_interval_seconds must be > 0".into(),
            ));
        }
        let timeouts = [
            self.probes.fingerprint_timeout_seconds,
            self.probes.port_scan_timeout_seconds,
            self.probes.certificate_timeout_seconds,
            self.probes.template_timeout_seconds,
            self.probes.cve_lookup_timeout_seconds,
        ];
        if timeouts.iter().any(|&t| t == 0) {
            return Err(ValidationError("probe timeouts must be > 0".into()));
        }
        if self.probes.port_scan_concurrency == 0 {
            return Err(ValidationError(
                "probes.port_scan_concurrency must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Error type for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("configuration file error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan.max_concurrent_scans, 5);
        assert_eq!(config.scan.retention(), Duration::from_secs(600));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = Config::default();
        config.scan.max_concurrent_scans = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.probes.certificate_timeout_seconds = 0;
        assert!(config.validate().is_err());
    }
}
