//! Pool configuration
//!
//! Library defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables
//! 3. Library defaults
//!
//! ```rust,ignore
//! let config = PoolConfig::from_env().workers(8).name("rpc");
//! ```

use svcpool_core::constants::MAX_WORKERS;
use svcpool_core::env::{env_get, env_get_opt};
use svcpool_core::error::{Error, Result};

/// Worker count when neither the builder nor the environment sets one.
pub const DEFAULT_WORKERS: usize = 1;

/// Worker pool configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Thread name prefix; threads are named `<name>.<pool id>.worker-<n>`
    pub name: String,
    /// Stack size for worker threads, platform default when `None`
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl PoolConfig {
    /// Library defaults, ignoring the environment.
    pub fn defaults() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            name: "svcpool".to_string(),
            stack_size: None,
        }
    }

    /// Defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `SVCPOOL_WORKERS` - Number of worker threads
    /// - `SVCPOOL_POOL_NAME` - Thread name prefix
    /// - `SVCPOOL_STACK_SIZE` - Worker stack size in bytes
    pub fn from_env() -> Self {
        let d = Self::defaults();
        Self {
            workers: env_get("SVCPOOL_WORKERS", d.workers),
            name: env_get("SVCPOOL_POOL_NAME", d.name),
            stack_size: env_get_opt("SVCPOOL_STACK_SIZE").or(d.stack_size),
        }
    }

    /// Set number of worker threads
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    /// Set the thread name prefix
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set worker stack size
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1"));
        }
        if self.workers > MAX_WORKERS {
            return Err(Error::InvalidConfig("workers exceeds maximum"));
        }
        if self.name.is_empty() {
            return Err(Error::InvalidConfig("name must not be empty"));
        }
        Ok(())
    }
}
