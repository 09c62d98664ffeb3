//! Latchkey Core - Distributed mutual exclusion over a TTL key-value store
//!
//! This crate provides:
//! - [`LockClient`]: probe / acquire / release / extend against any
//!   [`KeyValueStore`](latchkey_store::KeyValueStore)
//! - [`LockToken`]: the per-acquisition owner token
//! - [`LockGuard`]: scoped ownership with a background renewal task
//! - Lock metrics through the `metrics` facade
//!
//! Mutual exclusion comes entirely from the store's atomic create-if-absent.
//! Nothing here is fair, reentrant, or a consensus protocol.

pub mod client;
pub mod config;
pub mod guard;
pub mod metrics;
pub mod model;

pub use client::LockClient;
pub use config::LockClientConfig;
pub use guard::LockGuard;
pub use model::{Acquisition, LockToken};

// Re-export the collaborator types callers need to build a client
pub use latchkey_common::{LatchError, Result};
pub use latchkey_store::{KeyValueStore, MemoryStore, TtlState};
#[cfg(feature = "redis")]
pub use latchkey_store::RedisStore;
