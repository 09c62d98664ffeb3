//! Latchkey Common - Shared types and constants
//!
//! This crate provides the foundational types used across all Latchkey components:
//! - The lock error taxonomy and result alias
//! - Common constants

pub mod error;

// Re-exports for convenience
pub use error::{LatchError, Result};

/// Default lock time-to-live in milliseconds
pub const DEFAULT_TTL_MS: u64 = 30_000;

/// Default fraction of the TTL after which a guard renews its lock
pub const DEFAULT_RENEW_RATIO: f64 = 1.0 / 3.0;

/// Environment variable prefix used by configuration sources
pub const ENV_PREFIX: &str = "LATCHKEY";

/// Default Redis endpoint used by tests and the CLI
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
