//! Configuration for the Keel runtime
//!
//! Handles loading and managing kernel configuration.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use keel_core::error::ConfigError;
use keel_core::logging::LogLevel;

/// Kernel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Minimum log level for kernel diagnostics
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Maximum number of blocks listed per leak report
    #[serde(default = "default_leak_report_limit")]
    pub leak_report_limit: usize,

    /// Whether the final destroy runs a leak report automatically
    #[serde(default = "default_leak_check_on_destroy")]
    pub leak_check_on_destroy: bool,

    /// Name prefix for kernel worker threads
    #[serde(default = "default_worker_name_prefix")]
    pub worker_name_prefix: String,

    /// Additional configuration
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_leak_report_limit() -> usize {
    32
}

fn default_leak_check_on_destroy() -> bool {
    true
}

fn default_worker_name_prefix() -> String {
    "keel-worker".to_string()
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            leak_report_limit: default_leak_report_limit(),
            leak_check_on_destroy: default_leak_check_on_destroy(),
            worker_name_prefix: default_worker_name_prefix(),
            extra: HashMap::new(),
        }
    }
}

impl KernelConfig {
    /// Load configuration from a file
    pub fn load(path: Option<&str>) -> Result<Self> {
        // Start with default configuration
        let mut config = KernelConfig::default();

        // If a path is provided, try to load from it
        if let Some(path) = path {
            info!("Loading kernel configuration from {}", path);

            // A missing file falls back to defaults
            if !Path::new(path).exists() {
                warn!("Kernel configuration file not found: {}", path);
                return Ok(config);
            }

            let content = std::fs::read_to_string(path)
                .context(format!("Failed to read configuration file: {}", path))?;

            config = serde_json::from_str(&content)
                .context(format!("Failed to parse configuration file: {}", path))?;
        } else {
            info!("No kernel configuration file specified, using defaults");
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.leak_report_limit == 0 {
            return Err(ConfigError::Invalid(
                "Leak report limit cannot be zero".to_string(),
            ));
        }

        if self.worker_name_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "Worker name prefix cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Merge with another configuration
    pub fn merge(&mut self, other: KernelConfig) {
        self.log_level = other.log_level;
        self.leak_check_on_destroy = other.leak_check_on_destroy;

        if other.leak_report_limit > 0 {
            self.leak_report_limit = other.leak_report_limit;
        }

        if !other.worker_name_prefix.is_empty() {
            self.worker_name_prefix = other.worker_name_prefix;
        }

        for (key, value) in other.extra {
            self.extra.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        // Create a temporary config file
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let config_json = r#"
        {
            "log_level": "Debug",
            "leak_report_limit": 8,
            "leak_check_on_destroy": false
        }
        "#;

        std::fs::write(path, config_json).unwrap();

        let config = KernelConfig::load(Some(path)).unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.leak_report_limit, 8);
        assert!(!config.leak_check_on_destroy);
        // Unspecified fields keep their defaults
        assert_eq!(config.worker_name_prefix, "keel-worker");
    }

    #[test]
    fn test_default_config() {
        let config = KernelConfig::load(None).unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.leak_report_limit, 32);
        assert!(config.leak_check_on_destroy);
        assert_eq!(config.worker_name_prefix, "keel-worker");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = KernelConfig::load(Some("/nonexistent/keel.json")).unwrap();
        assert_eq!(config.leak_report_limit, 32);
    }

    #[test]
    fn test_validate() {
        let mut config = KernelConfig::default();
        assert!(config.validate().is_ok());

        config.leak_report_limit = 0;
        assert!(config.validate().is_err());

        config.leak_report_limit = 16;
        config.worker_name_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_merge_config() {
        let mut base = KernelConfig::default();

        let override_config = KernelConfig {
            log_level: LogLevel::Trace,
            leak_report_limit: 4,
            leak_check_on_destroy: false,
            worker_name_prefix: "override-worker".to_string(),
            extra: HashMap::new(),
        };

        base.merge(override_config);

        assert_eq!(base.log_level, LogLevel::Trace);
        assert_eq!(base.leak_report_limit, 4);
        assert!(!base.leak_check_on_destroy);
        assert_eq!(base.worker_name_prefix, "override-worker");
    }
}
