//! Configuration types

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default pacing window for inconsistency errors (30 seconds).
pub const DEFAULT_INCONSISTENCY_LOG_INTERVAL_MS: u64 = 30_000;

/// Diagnostic settings for a resilience strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ResilienceConfig {
    /// Minimum spacing between ERROR-level inconsistency reports, in milliseconds.
    /// Reports inside the window are demoted to DEBUG.
    pub inconsistency_log_interval_ms: u64,
    /// Whether successful recoveries are logged at DEBUG.
    pub log_recoveries: bool,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            inconsistency_log_interval_ms: DEFAULT_INCONSISTENCY_LOG_INTERVAL_MS,
            log_recoveries: true,
        }
    }
}

impl ResilienceConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inconsistency pacing window. Saturates at `u64::MAX` milliseconds.
    pub fn with_inconsistency_log_interval(mut self, interval: Duration) -> Self {
        self.inconsistency_log_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Enable or disable recovery logging.
    pub fn with_log_recoveries(mut self, enabled: bool) -> Self {
        self.log_recoveries = enabled;
        self
    }

    /// The inconsistency pacing window as a [`Duration`].
    pub fn inconsistency_log_interval(&self) -> Duration {
        Duration::from_millis(self.inconsistency_log_interval_ms)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - inconsistency_log_interval_ms > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inconsistency_log_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "inconsistency_log_interval_ms".to_string(),
                value: self.inconsistency_log_interval_ms.to_string(),
                reason: "inconsistency_log_interval_ms must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ResilienceConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
