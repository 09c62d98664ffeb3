//! Configuration management for the `latchkey` binary
//!
//! Sources, lowest precedence first: `conf/latchkey.{yml,toml,json}` (or the
//! file passed with `--config`), `LATCHKEY_*` environment variables with `__`
//! as the section separator (e.g. `LATCHKEY_LOCK__KEY_PREFIX`), then command
//! line flags.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use latchkey_common::{ENV_PREFIX, LatchError};
use latchkey_core::LockClientConfig;
use serde::Deserialize;

use crate::startup::LoggingConfig;

const DEFAULT_CONFIG_FILE: &str = "conf/latchkey";

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "latchkey", version, about = "Distributed locks on a TTL key-value store")]
pub struct Cli {
    /// Configuration file (yml, toml or json)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    #[arg(long = "redis-url", env = "LATCHKEY_REDIS_URL", global = true)]
    pub redis_url: Option<String>,
    #[arg(long = "key-prefix", global = true)]
    pub key_prefix: Option<String>,
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Report whether a lock is held; with --ttl-ms, install a TTL on a held key that has none
    Probe {
        name: String,
        #[arg(long = "ttl-ms", default_value_t = 0)]
        ttl_ms: u64,
    },
    /// Try once to acquire a lock and print its owner token
    Acquire {
        name: String,
        #[arg(long = "ttl-ms")]
        ttl_ms: Option<u64>,
        /// On contention, install the TTL on a holder key that has none
        #[arg(long = "extend-on-contention")]
        extend_on_contention: bool,
    },
    /// Release a lock owned by the given token
    Release {
        name: String,
        #[arg(long = "token")]
        token: String,
    },
    /// Delete a lock whoever holds it
    ForceRelease { name: String },
    /// Reset the TTL of a lock owned by the given token
    Extend {
        name: String,
        #[arg(long = "token")]
        token: String,
        #[arg(long = "ttl-ms")]
        ttl_ms: Option<u64>,
    },
    /// Acquire with renewal, hold for a while, then release
    Hold {
        name: String,
        #[arg(long = "ttl-ms")]
        ttl_ms: Option<u64>,
        #[arg(long = "hold-ms", default_value_t = 1000)]
        hold_ms: u64,
        /// Keep retrying with backoff for up to this long
        #[arg(long = "wait-ms", default_value_t = 0)]
        wait_ms: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default)]
    pub file: bool,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console: true,
            file: false,
            dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub lock: LockClientConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

fn config_error(e: config::ConfigError) -> LatchError {
    LatchError::Config(e.to_string())
}

impl Settings {
    /// Load settings from file, environment and command line overrides
    pub fn load(cli: &Cli) -> Result<Self, LatchError> {
        let file = match &cli.config {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = Config::builder().add_source(file).add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(url) = &cli.redis_url {
            builder = builder
                .set_override("store.redis_url", url.as_str())
                .map_err(config_error)?;
        }
        if let Some(prefix) = &cli.key_prefix {
            builder = builder
                .set_override("lock.key_prefix", prefix.as_str())
                .map_err(config_error)?;
        }
        if let Some(level) = &cli.log_level {
            builder = builder
                .set_override("logging.level", level.as_str())
                .map_err(config_error)?;
        }

        let settings: Settings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(config_error)?;

        settings.lock.validate()?;
        Ok(settings)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.logging.dir.clone(),
            self.logging.console,
            self.logging.file,
            &self.logging.level,
            &self.logging.rotation,
        )
    }
}
