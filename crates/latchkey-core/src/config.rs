//! Lock client configuration

use std::time::Duration;

use latchkey_common::{DEFAULT_RENEW_RATIO, DEFAULT_TTL_MS, LatchError, Result};
use serde::{Deserialize, Serialize};

/// Configuration shared by every lock issued through one client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockClientConfig {
    /// Prepended to every lock name to form the store key
    #[serde(default)]
    pub key_prefix: String,
    /// Fraction of the TTL after which a guard renews its lock, in (0, 1)
    #[serde(default = "default_renew_ratio")]
    pub renew_ratio: f64,
    /// TTL used when a caller does not supply one
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,
}

fn default_renew_ratio() -> f64 {
    DEFAULT_RENEW_RATIO
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL_MS
}

impl Default for LockClientConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            renew_ratio: DEFAULT_RENEW_RATIO,
            default_ttl_ms: DEFAULT_TTL_MS,
        }
    }
}

impl LockClientConfig {
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_renew_ratio(mut self, ratio: f64) -> Self {
        self.renew_ratio = ratio;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Interval at which a guard holding a lock of `ttl` renews it
    pub fn renew_interval(&self, ttl: Duration) -> Duration {
        ttl.mul_f64(self.renew_ratio).max(Duration::from_millis(1))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.renew_ratio > 0.0 && self.renew_ratio < 1.0) {
            return Err(LatchError::Config(format!(
                "renew_ratio must be between 0 and 1 (exclusive), got {}",
                self.renew_ratio
            )));
        }
        if self.default_ttl_ms == 0 {
            return Err(LatchError::Config(
                "default_ttl_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
