//! Lock client
//!
//! Provides:
//! - `probe`: existence check, optionally repairing a key that has no TTL
//! - `acquire`: single atomic create-with-expiry carrying a fresh owner token
//! - `release` / `force_release`: owner-checked and unconditional delete
//! - `extend`: owner-checked TTL reset
//! - `lock_scoped`: acquire plus a renewal task bound to a guard
//!
//! The client keeps no lock state of its own. Every answer comes from the store.

use std::sync::Arc;
use std::time::Duration;

use latchkey_common::{LatchError, Result};
use latchkey_store::{KeyValueStore, ttl_millis};
use tracing::{debug, info, warn};

use crate::config::LockClientConfig;
use crate::guard::LockGuard;
use crate::metrics;
use crate::model::{Acquisition, LockToken};

/// Stateless facade over a key-value store connection
#[derive(Clone)]
pub struct LockClient {
    store: Arc<dyn KeyValueStore>,
    config: Arc<LockClientConfig>,
}

impl LockClient {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            config: Arc::new(LockClientConfig::default()),
        }
    }

    pub fn with_config(store: Arc<dyn KeyValueStore>, config: LockClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &LockClientConfig {
        &self.config
    }

    /// Store key for a lock name
    pub fn key_for(&self, name: &str) -> String {
        format!("{}{}", self.config.key_prefix, name)
    }

    /// Report whether `name` is held.
    ///
    /// With `ttl` absent or zero this is a pure read. With a positive `ttl` a
    /// held key that has no expiry gets `ttl` installed; a key that already
    /// expires is left untouched. Existence is reported after any repair.
    pub async fn probe(&self, name: &str, ttl: Option<Duration>) -> Result<bool> {
        let key = self.key_for(name);

        if let Some(ttl) = ttl.filter(|ttl| !ttl.is_zero()) {
            self.repair_ttl(&key, ttl, "probe").await?;
        }

        self.store.exists(&key).await
    }

    /// Try to become the exclusive holder of `name` for `ttl`.
    ///
    /// On contention with `extend_on_contention` set, a holder key that has no
    /// expiry gets `ttl` installed. Contention never grants ownership.
    ///
    /// An error means the outcome is unknown: the key may have been created
    /// before the response was lost.
    pub async fn acquire(
        &self,
        name: &str,
        ttl: Duration,
        extend_on_contention: bool,
    ) -> Result<Acquisition> {
        if ttl.is_zero() {
            return Err(LatchError::InvalidTtl);
        }

        let token = LockToken::new(name, self.key_for(name), ttl);
        let created = match self
            .store
            .create_if_absent_with_ttl(token.key(), token.value(), ttl)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                metrics::record_acquire("error");
                return Err(e);
            }
        };

        if created {
            metrics::record_acquire("acquired");
            debug!(key = %token.key(), ttl_ms = ttl_millis(ttl), "Lock acquired");
            return Ok(Acquisition::Acquired(token));
        }

        metrics::record_acquire("contended");
        debug!(key = %token.key(), "Lock is held by another owner");

        if extend_on_contention {
            self.repair_ttl(token.key(), ttl, "acquire").await?;
        }

        Ok(Acquisition::Contended)
    }

    /// Release a lock this caller acquired.
    ///
    /// Deletes the key only if it still carries the token's owner value.
    /// Returns `false` if the lock already expired or now belongs to a
    /// different acquisition, which is left untouched.
    pub async fn release(&self, token: &LockToken) -> Result<bool> {
        let removed = self
            .store
            .compare_and_delete(token.key(), token.value())
            .await
            .inspect_err(|_| metrics::record_release("owned", "error"))?;

        metrics::record_release("owned", metrics::outcome_label(removed, "removed", "absent"));
        if removed {
            debug!(key = %token.key(), "Lock released");
        } else {
            warn!(key = %token.key(), "Lock was no longer held by this owner at release");
        }
        Ok(removed)
    }

    /// Delete the lock regardless of who holds it.
    ///
    /// Returns whether a key was removed. Releasing an absent lock is a no-op.
    pub async fn force_release(&self, name: &str) -> Result<bool> {
        let key = self.key_for(name);
        let removed = self
            .store
            .delete(&key)
            .await
            .inspect_err(|_| metrics::record_release("forced", "error"))?;

        metrics::record_release("forced", metrics::outcome_label(removed, "removed", "absent"));
        info!(key = %key, removed, "Lock force released");
        Ok(removed)
    }

    /// Reset the TTL of a held lock to `ttl`, only if the token still owns it
    pub async fn extend(&self, token: &LockToken, ttl: Duration) -> Result<bool> {
        if ttl.is_zero() {
            return Err(LatchError::InvalidTtl);
        }

        let extended = self
            .store
            .compare_and_expire(token.key(), token.value(), ttl)
            .await
            .inspect_err(|_| metrics::record_extend("error"))?;

        metrics::record_extend(metrics::outcome_label(extended, "extended", "lost"));
        debug!(key = %token.key(), ttl_ms = ttl_millis(ttl), extended, "Lock extension");
        Ok(extended)
    }

    /// Acquire `name` and keep it alive until the returned guard is released
    /// or dropped. Returns `None` on contention.
    pub async fn lock_scoped(&self, name: &str, ttl: Duration) -> Result<Option<LockGuard>> {
        match self.acquire(name, ttl, false).await? {
            Acquisition::Acquired(token) => Ok(Some(LockGuard::start(self.clone(), token))),
            Acquisition::Contended => Ok(None),
        }
    }

    /// Install `ttl` on a held key that has no expiry. The store checks and
    /// sets in one step, so a key that gained a deadline in the meantime keeps it.
    async fn repair_ttl(&self, key: &str, ttl: Duration, source: &'static str) -> Result<()> {
        if self.store.set_ttl_if_persistent(key, ttl).await? {
            metrics::record_ttl_repair(source);
            warn!(key = %key, ttl_ms = ttl_millis(ttl), source, "Installed TTL on lock key without expiry");
        }
        Ok(())
    }
}
