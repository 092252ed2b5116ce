//! Graph build configuration

use crate::error::{ModuleError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options controlling how an application graph is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Instantiate every singleton provider and controller while bootstrapping
    pub eager: bool,
    /// Maximum number of dynamic module factories running at once
    pub factory_concurrency: usize,
    /// Per-factory time limit in milliseconds
    pub factory_timeout_ms: Option<u64>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            eager: true,
            factory_concurrency: 16,
            factory_timeout_ms: None,
        }
    }
}

impl BuildConfig {
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder::default()
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| ModuleError::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON string
    pub fn from_json(json_str: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json_str)
            .map_err(|e| ModuleError::Config(format!("Failed to parse JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.factory_concurrency == 0 {
            return Err(ModuleError::Config(
                "factory_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn factory_timeout(&self) -> Option<Duration> {
        self.factory_timeout_ms.map(Duration::from_millis)
    }
}

/// Configuration builder with validation
#[derive(Default)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    pub fn eager(mut self, eager: bool) -> Self {
        self.config.eager = eager;
        self
    }

    pub fn factory_concurrency(mut self, limit: usize) -> Self {
        self.config.factory_concurrency = limit;
        self
    }

    pub fn factory_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.config.factory_timeout_ms = Some(millis);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<BuildConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// Example configuration file:
// ```toml
// eager = false
// factory_concurrency = 4
// factory_timeout_ms = 2000
// ```
