//! Runtime configuration.
//!
//! A [`RuntimeConfig`] is consumed by [`Runtime::new`](crate::Runtime::new).
//! The process-wide runtime reads its configuration from the environment:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `OXIDEF_TYPE_TABLE_CAPACITY` | usable type ids | 1024 |
//! | `OXIDEF_LOG` | log threshold (`off`..`trace`) | unchanged |

use crate::error::{Error, Result};
use oxidef_log::Level;

/// Environment variable holding the type table capacity.
pub const TYPE_TABLE_CAPACITY_VAR: &str = "OXIDEF_TYPE_TABLE_CAPACITY";

/// Default number of usable type ids.
pub const DEFAULT_TYPE_TABLE_CAPACITY: usize = 1024;

/// Settings applied when a [`Runtime`](crate::Runtime) is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum number of types that can ever be registered (ids are never
    /// reused, so unregistering does not free capacity).
    pub type_table_capacity: usize,
    /// Log threshold to apply, or `None` to leave the logger alone.
    pub log_level: Option<Level>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            type_table_capacity: DEFAULT_TYPE_TABLE_CAPACITY,
            log_level: None,
        }
    }
}

impl RuntimeConfig {
    /// Sets the type table capacity.
    #[must_use]
    pub fn with_type_table_capacity(mut self, capacity: usize) -> Self {
        self.type_table_capacity = capacity;
        self
    }

    /// Sets the log threshold applied at runtime creation.
    #[must_use]
    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Builds a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a variable is set to something
    /// that does not parse, or the capacity is zero.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`RuntimeConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = RuntimeConfig::default();

        if let Some(raw) = lookup(TYPE_TABLE_CAPACITY_VAR) {
            let capacity = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|&c| c > 0)
                .ok_or(Error::InvalidConfig {
                    name: TYPE_TABLE_CAPACITY_VAR,
                    value: raw.clone(),
                })?;
            config.type_table_capacity = capacity;
        }

        if let Some(raw) = lookup(oxidef_log::ENV_VAR) {
            let level = raw.parse::<Level>().map_err(|_| Error::InvalidConfig {
                name: oxidef_log::ENV_VAR,
                value: raw.clone(),
            })?;
            config.log_level = Some(level);
        }

        Ok(config)
    }
}
