//! Scoped lock ownership with background renewal
//!
//! A [`LockGuard`] owns one acquisition and a renewal task that extends the
//! lock every `ttl * renew_ratio`. The task is cancelled on every exit path:
//! explicit release, drop, or the lock being lost.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use latchkey_common::{LatchError, Result};
use latchkey_store::ttl_millis;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, timeout_at};
use tracing::{debug, error, info, warn};

use crate::client::LockClient;
use crate::metrics;
use crate::model::LockToken;

/// Holds a lock until released or dropped, renewing it in the background
pub struct LockGuard {
    client: LockClient,
    token: LockToken,
    lost: Arc<AtomicBool>,
    stop_tx: Option<mpsc::Sender<()>>,
    renewal: Option<JoinHandle<()>>,
    closed: bool,
}

impl LockGuard {
    pub(crate) fn start(client: LockClient, token: LockToken) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let (stop_tx, stop_rx) = mpsc::channel(1);

        let task = RenewalTask {
            client: client.clone(),
            token: token.clone(),
            every: client.config().renew_interval(token.ttl()),
            lost: lost.clone(),
        };
        let renewal = tokio::spawn(task.run(stop_rx));

        metrics::guard_opened();
        info!(key = %token.key(), ttl_ms = ttl_millis(token.ttl()), "Lock guard started");

        Self {
            client,
            token,
            lost,
            stop_tx: Some(stop_tx),
            renewal: Some(renewal),
            closed: false,
        }
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    pub fn name(&self) -> &str {
        self.token.name()
    }

    /// Whether renewal observed that the lock expired or changed owner
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Fail with [`LatchError::StaleLock`] if the lock is known to be lost
    pub fn ensure_held(&self) -> Result<()> {
        if self.is_lost() {
            return Err(LatchError::StaleLock {
                name: self.token.name().to_string(),
            });
        }
        Ok(())
    }

    /// Stop renewal and release the lock.
    ///
    /// Returns `false` if the lock was no longer held by this guard.
    pub async fn release(mut self) -> Result<bool> {
        self.stop_renewal();
        self.close();
        self.client.release(&self.token).await
    }

    fn stop_renewal(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(handle) = self.renewal.take() {
            handle.abort();
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            metrics::guard_closed();
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.stop_renewal();
        if self.closed {
            return;
        }
        self.close();

        // Best-effort release; without a runtime the lock is left to expire
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                let token = self.token.clone();
                handle.spawn(async move {
                    if let Err(e) = client.release(&token).await {
                        error!(key = %token.key(), error = %e, "Failed to release dropped lock guard");
                    }
                });
            }
            Err(_) => {
                warn!(key = %self.token.key(), "Lock guard dropped outside a runtime, lock left to expire");
            }
        }
    }
}

/// Periodic extension of one acquisition
struct RenewalTask {
    client: LockClient,
    token: LockToken,
    every: Duration,
    lost: Arc<AtomicBool>,
}

impl RenewalTask {
    async fn run(self, mut stop_rx: mpsc::Receiver<()>) {
        let ttl = self.token.ttl();
        let mut ticker = interval_at(Instant::now() + self.every, self.every);
        // Store-side deadline as of the last extension known to have landed,
        // timed from before the request was sent
        let mut deadline = self.token.acquired_at() + ttl;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let attempt = Instant::now();
                    match timeout_at(deadline, self.client.extend(&self.token, ttl)).await {
                        Ok(Ok(true)) => {
                            deadline = attempt + ttl;
                        }
                        Ok(Ok(false)) => {
                            warn!(key = %self.token.key(), "Lock lost: expired or taken over before renewal");
                            self.mark_lost();
                            break;
                        }
                        Ok(Err(e)) => {
                            error!(key = %self.token.key(), error = %e, "Lock renewal error");
                            // The next attempt would land after the lock may have expired
                            if Instant::now() + self.every >= deadline {
                                warn!(key = %self.token.key(), "Lock lost: no successful renewal before the TTL ran out");
                                self.mark_lost();
                                break;
                            }
                        }
                        Err(_) => {
                            warn!(key = %self.token.key(), "Lock lost: renewal did not complete before the TTL ran out");
                            self.mark_lost();
                            break;
                        }
                    }
                }
                _ = stop_rx.recv() => {
                    break;
                }
            }
        }

        debug!(key = %self.token.key(), "Lock renewal task stopped");
    }

    fn mark_lost(&self) {
        self.lost.store(true, Ordering::Release);
        metrics::record_lock_lost();
    }
}

#[cfg(test)]
mod tests {
    use latchkey_store::{KeyValueStore, MemoryStore, TtlState};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_guard_renews_past_ttl() {
        let store = Arc::new(MemoryStore::new());
        let client = LockClient::new(store.clone());

        let guard = client
            .lock_scoped("job", Duration::from_millis(300))
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1000)).await;

        assert!(!guard.is_lost());
        assert!(store.exists("job").await.unwrap());
        assert!(matches!(store.get_ttl("job").await.unwrap(), TtlState::Expiring(_)));

        assert!(guard.release().await.unwrap());
        assert!(!store.exists("job").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_detects_takeover() {
        let store = Arc::new(MemoryStore::new());
        let client = LockClient::new(store.clone());

        let guard = client
            .lock_scoped("job", Duration::from_millis(300))
            .await
            .unwrap()
            .unwrap();

        // Someone force releases and a second owner moves in
        assert!(client.force_release("job").await.unwrap());
        let successor = client
            .acquire("job", Duration::from_secs(10), false)
            .await
            .unwrap()
            .into_token()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(guard.is_lost());
        assert!(matches!(
            guard.ensure_held(),
            Err(LatchError::StaleLock { .. })
        ));

        // The stale guard must not delete the successor's lock
        assert!(!guard.release().await.unwrap());
        assert_eq!(
            store.get("job").await.unwrap().as_deref(),
            Some(successor.value())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_guard_releases() {
        let store = Arc::new(MemoryStore::new());
        let client = LockClient::new(store.clone());

        {
            let _guard = client
                .lock_scoped("job", Duration::from_secs(10))
                .await
                .unwrap()
                .unwrap();
            assert!(store.exists("job").await.unwrap());
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!store.exists("job").await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_scoped_contention() {
        let store = Arc::new(MemoryStore::new());
        let client = LockClient::new(store);

        let guard = client
            .lock_scoped("job", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(guard.is_some());

        let second = client
            .lock_scoped("job", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(second.is_none());
    }
}
