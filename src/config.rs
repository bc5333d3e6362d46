use crate::{PoolError, RuntimeError};
use serde::{Deserialize, Serialize};

/// Size bounds and retention policy of an [`ObjectPool`](crate::ObjectPool).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Instances created up front, idle.
    pub init_count: usize,

    /// Hard cap on idle plus checked-out instances. `0` means unbounded.
    pub max_count: usize,

    /// Idle instances kept by auto-recycle. Defaults to `init_count`.
    pub retain_count: Option<usize>,

    /// Whether auto-recycle takes back checked-out instances that are not locked.
    pub reclaim_checked_out: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            init_count: 0,
            max_count: 0,
            retain_count: None,
            reclaim_checked_out: true,
        }
    }
}

impl PoolConfig {
    /// Creates a config with the given bounds and default retention.
    pub fn new(init_count: usize, max_count: usize) -> Self {
        Self {
            init_count,
            max_count,
            ..Self::default()
        }
    }

    /// Returns the cap, or `None` when unbounded.
    pub fn bound(&self) -> Option<usize> {
        (self.max_count > 0).then_some(self.max_count)
    }

    /// Returns the number of idle instances auto-recycle keeps.
    pub fn retention(&self) -> usize {
        self.retain_count.unwrap_or(self.init_count)
    }

    /// Checks that the bounds are consistent.
    pub fn validate(&self) -> Result<(), PoolError> {
        if let Some(max) = self.bound() {
            if self.init_count > max {
                return Err(PoolError::InvalidConfig(format!(
                    "init_count {} exceeds max_count {}",
                    self.init_count, max
                )));
            }
        }
        Ok(())
    }
}

/// Configuration of a [`Runtime`](crate::Runtime) and the pools it manages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Defaults for pools created on demand by the registry.
    pub pool: PoolConfig,

    /// Frames between registry auto-recycle passes. `0` disables them.
    pub auto_recycle_interval: u64,
}

impl RuntimeConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// Missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, RuntimeError> {
        let config: Self = serde_json::from_str(json)?;
        config.pool.validate()?;
        Ok(config)
    }
}
