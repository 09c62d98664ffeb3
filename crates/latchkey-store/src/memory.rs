// In-memory key-value store with TTL expiry
// Expiry follows the tokio clock so paused-time tests can drive it

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use latchkey_common::Result;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval};
use tracing::debug;

use super::{KeyValueStore, TtlState};

/// A stored value and its optional deadline
#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// In-process store backed by a `DashMap`.
///
/// Expired entries are invisible to every operation and removed lazily.
/// [`MemoryStore::with_cleanup`] additionally sweeps them in the background.
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
    _cleanup_handle: Option<JoinHandle<()>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            _cleanup_handle: None,
        }
    }

    /// Start a background task that removes expired entries every `every`.
    /// Must be called from within a tokio runtime.
    pub fn with_cleanup(mut self, every: Duration) -> Self {
        let entries = self.entries.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            loop {
                ticker.tick().await;
                Self::sweep(&entries);
            }
        });

        self._cleanup_handle = Some(handle);
        self
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        Self::sweep(&self.entries)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep(entries: &DashMap<String, StoredValue>) -> usize {
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, stored| stored.is_live(now));
        let removed = before.saturating_sub(entries.len());

        if removed > 0 {
            debug!(count = removed, "Swept expired store entries");
        }
        removed
    }

    fn create(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        let now = Instant::now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return false;
                }
                occupied.insert(StoredValue::new(value, ttl));
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, ttl));
                true
            }
        }
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        if let Some(handle) = self._cleanup_handle.take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn create_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        Ok(self.create(key, value, None))
    }

    async fn create_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        Ok(self.create(key, value, Some(ttl)))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, stored)| stored.is_live(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self.entries.get(key).is_some_and(|e| e.is_live(now)))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn get_ttl(&self, key: &str) -> Result<TtlState> {
        let now = Instant::now();
        let state = match self.entries.get(key) {
            Some(e) if e.is_live(now) => match e.expires_at {
                Some(deadline) => TtlState::Expiring(deadline - now),
                None => TtlState::Persistent,
            },
            _ => TtlState::Missing,
        };
        Ok(state)
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        if let Some(mut e) = self.entries.get_mut(key)
            && e.is_live(now)
        {
            e.expires_at = Some(now + ttl);
            return Ok(true);
        }
        Ok(false)
    }

    async fn set_ttl_if_persistent(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        if let Some(mut e) = self.entries.get_mut(key)
            && e.is_live(now)
            && e.expires_at.is_none()
        {
            e.expires_at = Some(now + ttl);
            return Ok(true);
        }
        Ok(false)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove_if(key, |_, stored| stored.is_live(now) && stored.value == expected)
            .is_some())
    }

    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        if let Some(mut e) = self.entries.get_mut(key)
            && e.is_live(now)
            && e.value == expected
        {
            e.expires_at = Some(now + ttl);
            return Ok(true);
        }
        Ok(false)
    }
}
