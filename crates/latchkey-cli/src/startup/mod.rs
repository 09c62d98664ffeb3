//! Process startup: logging and store construction

mod logging;

use std::sync::Arc;
use std::time::Duration;

use latchkey_store::{KeyValueStore, MemoryStore};
use tracing::warn;

pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};

use crate::model::config::Settings;

/// Sweep interval of the fallback memory store
const MEMORY_STORE_SWEEP: Duration = Duration::from_secs(5);

/// Build the store named by the settings.
///
/// Without a Redis URL this falls back to an in-process memory store, which
/// only coordinates tasks inside this one process.
pub async fn build_store(settings: &Settings) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match settings.store.redis_url.as_deref() {
        #[cfg(feature = "redis")]
        Some(url) => Ok(Arc::new(latchkey_store::RedisStore::connect(url).await?)),
        #[cfg(not(feature = "redis"))]
        Some(_) => anyhow::bail!("a Redis URL is configured but this build has no Redis support"),
        None => {
            warn!("No Redis URL configured, using an in-process memory store");
            Ok(Arc::new(MemoryStore::new().with_cleanup(MEMORY_STORE_SWEEP)))
        }
    }
}
