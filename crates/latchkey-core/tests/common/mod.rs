//! Shared store doubles for lock client tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use latchkey_core::{KeyValueStore, LatchError, MemoryStore, Result, TtlState};

fn unavailable() -> LatchError {
    LatchError::StoreUnavailable("connection reset by peer".to_string())
}

/// Memory store that can be switched into an unreachable state
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    down: AtomicBool,
}

impl FaultyStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn create_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.check()?;
        self.inner.create_if_absent(key, value).await
    }

    async fn create_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.check()?;
        self.inner.create_if_absent_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check()?;
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn get_ttl(&self, key: &str) -> Result<TtlState> {
        self.check()?;
        self.inner.get_ttl(key).await
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.check()?;
        self.inner.set_ttl(key, ttl).await
    }

    async fn set_ttl_if_persistent(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.check()?;
        self.inner.set_ttl_if_persistent(key, ttl).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.check()?;
        self.inner.compare_and_delete(key, expected).await
    }

    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
        self.check()?;
        self.inner.compare_and_expire(key, expected, ttl).await
    }
}

/// Store without a native create-with-expiry, so the trait's two-step
/// fallback is used. The second step can be made to fail.
#[derive(Default)]
pub struct TwoStepStore {
    pub inner: MemoryStore,
    fail_set_ttl: AtomicBool,
}

impl TwoStepStore {
    pub fn fail_set_ttl(&self, fail: bool) {
        self.fail_set_ttl.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for TwoStepStore {
    async fn create_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.inner.create_if_absent(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn get_ttl(&self, key: &str) -> Result<TtlState> {
        self.inner.get_ttl(key).await
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<bool> {
        if self.fail_set_ttl.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.inner.set_ttl(key, ttl).await
    }

    async fn set_ttl_if_persistent(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.inner.set_ttl_if_persistent(key, ttl).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.inner.compare_and_delete(key, expected).await
    }

    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
        self.inner.compare_and_expire(key, expected, ttl).await
    }
}

/// Memory store where a TTL-less key changes hands at the worst moment.
///
/// The first TTL read or write against the key deletes it and lets a new
/// owner take it with `successor_ttl`, just before the call reaches the
/// inner store (or just after, for reads).
pub struct HandOverStore {
    pub inner: MemoryStore,
    key: String,
    successor: String,
    successor_ttl: Duration,
    handed_over: AtomicBool,
}

impl HandOverStore {
    pub fn new(key: &str, successor: &str, successor_ttl: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            key: key.to_string(),
            successor: successor.to_string(),
            successor_ttl,
            handed_over: AtomicBool::new(false),
        }
    }

    pub fn handed_over(&self) -> bool {
        self.handed_over.load(Ordering::SeqCst)
    }

    async fn hand_over(&self, key: &str) -> Result<()> {
        if key == self.key && !self.handed_over.swap(true, Ordering::SeqCst) {
            self.inner.delete(key).await?;
            self.inner
                .create_if_absent_with_ttl(key, &self.successor, self.successor_ttl)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for HandOverStore {
    async fn create_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.inner.create_if_absent(key, value).await
    }

    async fn create_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        self.inner.create_if_absent_with_ttl(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn get_ttl(&self, key: &str) -> Result<TtlState> {
        let state = self.inner.get_ttl(key).await?;
        self.hand_over(key).await?;
        Ok(state)
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.hand_over(key).await?;
        self.inner.set_ttl(key, ttl).await
    }

    async fn set_ttl_if_persistent(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.hand_over(key).await?;
        self.inner.set_ttl_if_persistent(key, ttl).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        self.inner.compare_and_delete(key, expected).await
    }

    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
        self.inner.compare_and_expire(key, expected, ttl).await
    }
}
