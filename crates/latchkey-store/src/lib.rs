//! Latchkey Store - Key-value store collaborators
//!
//! This crate provides:
//! - The [`KeyValueStore`] trait a lock client needs from its backing store
//! - [`MemoryStore`], an in-process store with TTL expiry
//! - [`RedisStore`], a Redis-backed store (feature `redis`)
//!
//! All lock state lives in the store. Implementations must make every single
//! method atomic per key; nothing above this layer adds in-process coordination.

use std::time::Duration;

use async_trait::async_trait;
use latchkey_common::Result;

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Remaining lifetime of a key as reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlState {
    /// The key does not exist
    Missing,
    /// The key exists and never expires
    Persistent,
    /// The key exists and expires after the given duration
    Expiring(Duration),
}

impl TtlState {
    /// Whether the key exists, with or without an expiry
    pub fn exists(&self) -> bool {
        !matches!(self, TtlState::Missing)
    }

    /// Remaining lifetime, if the key has one
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            TtlState::Expiring(remaining) => Some(*remaining),
            _ => None,
        }
    }
}

/// Key-value store collaborator used by the lock client.
///
/// Transport failures and timeouts must surface as
/// [`LatchError::StoreUnavailable`](latchkey_common::LatchError::StoreUnavailable),
/// never as a `false` result.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Atomically create `key` with `value` if it does not exist
    async fn create_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Atomically create `key` with `value` and an expiry if it does not exist.
    ///
    /// The default runs `create_if_absent` then `set_ttl` as two round trips.
    /// If the second step never lands the key is left without an expiry, so
    /// stores with a native primitive should override this.
    async fn create_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        if !self.create_if_absent(key, value).await? {
            return Ok(false);
        }
        self.set_ttl(key, ttl).await
    }

    /// Delete `key`. Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn get_ttl(&self, key: &str) -> Result<TtlState>;

    /// Set the expiry of an existing key. Returns `false` if the key is absent.
    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Atomically set the expiry of `key` only if it exists and has none.
    ///
    /// Returns `false` for an absent key and for a key that already expires,
    /// whose deadline is left untouched.
    async fn set_ttl_if_persistent(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Atomically delete `key` only if its value equals `expected`
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool>;

    /// Atomically reset the expiry of `key` only if its value equals `expected`
    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool>;
}

/// Millisecond form of a TTL, never rounded down to zero
pub fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
