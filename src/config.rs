//! Router configuration.
//!
//! ```toml
//! bootstrap = ["10.0.0.1:6379", "10.0.0.2:6379"]
//! refresh_interval_secs = 30
//! pool_size = 4
//! connect_timeout_ms = 1000
//! ```

use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Seed addresses, tried in order
    pub bootstrap: Vec<String>,
    /// Period of the background topology refresh
    pub refresh_interval_secs: u64,
    /// Maximum idle connections kept per node by the TCP pool
    pub pool_size: usize,
    pub connect_timeout_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            bootstrap: Vec::new(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            pool_size: DEFAULT_POOL_SIZE,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl ClusterConfig {
    /// Default settings with the given seed addresses.
    pub fn with_bootstrap<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            bootstrap: addrs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| ClusterError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClusterError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Check for an empty seed list and zero interval or pool size.
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap.is_empty() {
            return Err(ClusterError::Config(
                "at least one bootstrap address is required".to_string(),
            ));
        }
        if self.refresh_interval_secs == 0 {
            return Err(ClusterError::Config(
                "refresh_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.pool_size == 0 {
            return Err(ClusterError::Config(
                "pool_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Refresh interval as a `Duration`
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Connect timeout as a `Duration`
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
