//! Host configuration, loaded from TOML.
//!
//! ```toml
//! cycle_time_ms = 10
//! watchdog_ms = 50
//! fault_policy = "trap"
//!
//! [retain]
//! path = "state/retain.bin"
//! persist_every = 100
//! ```
//!
//! Every field is optional; missing ones take the defaults below.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pou_kernel::arithmetic::FaultPolicy;

use crate::error::ConfigError;
use crate::retain_store::{FileRetainStore, MemoryRetainStore, RetainStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Scan period.
    pub cycle_time_ms: u64,
    /// A cycle running longer than this counts as an overrun.
    pub watchdog_ms: u64,
    pub fault_policy: FaultPolicy,
    pub retain: RetainConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetainConfig {
    /// Without a path, retained values live in memory only.
    pub path: Option<PathBuf>,
    /// Persist every N cycles; 0 persists only at shutdown.
    pub persist_every: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cycle_time_ms: 10,
            watchdog_ms: 50,
            fault_policy: FaultPolicy::Trap,
            retain: RetainConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(?path, ?config, "loaded runtime config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_time_ms == 0 {
            return Err(ConfigError::Invalid("cycle_time_ms must be positive".to_string()));
        }
        if self.watchdog_ms < self.cycle_time_ms {
            return Err(ConfigError::Invalid(format!(
                "watchdog_ms ({}) is shorter than cycle_time_ms ({})",
                self.watchdog_ms, self.cycle_time_ms
            )));
        }
        Ok(())
    }

    pub fn cycle_time(&self) -> Duration {
        Duration::from_millis(self.cycle_time_ms)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.watchdog_ms)
    }

    /// Store selected by `retain.path`.
    pub fn open_retain_store(&self) -> Box<dyn RetainStore> {
        match &self.retain.path {
            Some(path) => Box::new(FileRetainStore::new(path)),
            None => Box::new(MemoryRetainStore::default()),
        }
    }
}
