//! Lock Guard Tests
//!
//! Renewal behaviour when the store stops answering. Runs on a paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FaultyStore;
use latchkey_core::{KeyValueStore, LatchError, LockClient, LockClientConfig, LockGuard};

const TTL: Duration = Duration::from_millis(1000);

async fn guarded(store: &Arc<FaultyStore>) -> anyhow::Result<LockGuard> {
    let config = LockClientConfig::default().with_renew_ratio(0.33);
    let client = LockClient::with_config(store.clone(), config)?;
    client
        .lock_scoped("res", TTL)
        .await?
        .ok_or_else(|| anyhow::anyhow!("lock was contended"))
}

#[tokio::test(start_paused = true)]
async fn test_outage_marks_lost_before_store_expiry() -> anyhow::Result<()> {
    let store = Arc::new(FaultyStore::default());
    let guard = guarded(&store).await?;

    store.set_down(true);

    // Renewals at 330ms and 660ms fail but leave room for another attempt;
    // the one at 990ms is the last chance before the key expires at 1000ms
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(!guard.is_lost());

    tokio::time::sleep(Duration::from_millis(295)).await;
    assert!(store.inner.exists("res").await?);
    assert!(guard.is_lost());
    assert!(matches!(
        guard.ensure_held(),
        Err(LatchError::StaleLock { .. })
    ));

    tokio::time::sleep(Duration::from_millis(105)).await;
    assert!(!store.inner.exists("res").await?);
    assert!(guard.is_lost());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_short_outage_is_survived() -> anyhow::Result<()> {
    let store = Arc::new(FaultyStore::default());
    let guard = guarded(&store).await?;

    store.set_down(true);
    tokio::time::sleep(Duration::from_millis(500)).await;
    store.set_down(false);

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert!(!guard.is_lost());
    guard.ensure_held()?;
    assert!(store.inner.exists("res").await?);

    assert!(guard.release().await?);
    assert!(!store.inner.exists("res").await?);
    Ok(())
}
