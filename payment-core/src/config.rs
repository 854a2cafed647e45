//! Configuration for the payment ledger

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Task controller configuration
    pub controller: ControllerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "payment-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            controller: ControllerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Task controller configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Maximum number of queued tasks
    pub queue_capacity: usize,

    /// Idle poll interval of the worker (milliseconds)
    pub poll_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 100,
            poll_interval_ms: 50,
        }
    }
}

impl ControllerConfig {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `payment_core=debug`
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(capacity) = std::env::var("PAYMENT_QUEUE_CAPACITY") {
            config.controller.queue_capacity = capacity.parse().map_err(|e| {
                crate::Error::Config(format!("PAYMENT_QUEUE_CAPACITY={capacity}: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("PAYMENT_POLL_INTERVAL_MS") {
            config.controller.poll_interval_ms = interval.parse().map_err(|e| {
                crate::Error::Config(format!("PAYMENT_POLL_INTERVAL_MS={interval}: {e}"))
            })?;
        }

        if let Ok(filter) = std::env::var("PAYMENT_LOG_FILTER") {
            config.logging.filter = filter;
        }

        if let Ok(json) = std::env::var("PAYMENT_LOG_JSON") {
            config.logging.json = matches!(json.as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        // tokio's bounded channel panics on zero capacity
        if self.controller.queue_capacity == 0 {
            return Err(crate::Error::Config(
                "controller.queue_capacity must be greater than zero".to_string(),
            ));
        }

        if self.controller.poll_interval_ms == 0 {
            return Err(crate::Error::Config(
                "controller.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "payment-core");
        assert_eq!(config.controller.queue_capacity, 100);
        assert_eq!(config.controller.poll_interval(), Duration::from_millis(50));
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_with_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "service_name = \"ledger-test\"\n\n[controller]\nqueue_capacity = 8\n"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.service_name, "ledger-test");
        assert_eq!(config.controller.queue_capacity, 8);
        assert_eq!(config.controller.poll_interval_ms, 50);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_from_file_rejects_zero_capacity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[controller]\nqueue_capacity = 0").unwrap();

        assert!(matches!(
            Config::from_file(file.path()),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_from_file_missing() {
        assert!(matches!(
            Config::from_file("/nonexistent/payment.toml"),
            Err(crate::Error::Io(_))
        ));
    }
}
