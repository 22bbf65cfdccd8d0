//! Processor configuration.
//!
//! ```toml
//! # secretstruct.toml
//! timeout_secs = 10
//! ```

use crate::{Result, SecretStructError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding [`Config::timeout_secs`].
pub const TIMEOUT_ENV: &str = "SECRETSTRUCT_TIMEOUT_SECS";

/// Settings shared by every resolution unit of a [`Processor`](crate::Processor).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Deadline for a whole `process` call, measured from its start.
    ///
    /// `None` waits as long as the providers take.
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Parses a configuration from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Loads a configuration file, then applies environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)?.with_env_overrides()
    }

    /// Applies `SECRETSTRUCT_TIMEOUT_SECS` if it is set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(TIMEOUT_ENV) {
            let secs = value.trim().parse::<u64>().map_err(|e| {
                SecretStructError::InvalidConfig(format!("{TIMEOUT_ENV}={value:?}: {e}"))
            })?;
            self.timeout_secs = Some(secs);
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
