//! Lock data model

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Receipt of one successful acquisition.
///
/// The `value` is the owner token stored under `key`. It proves which
/// acquisition created the current key instance and is required to release or
/// extend the lock. Holding a token does not mean the lock is still held: the
/// store may have expired it at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub(crate) name: String,
    pub(crate) key: String,
    pub(crate) value: String,
    pub(crate) ttl: Duration,
    pub(crate) acquired_at: Instant,
}

impl LockToken {
    pub(crate) fn new(name: &str, key: String, ttl: Duration) -> Self {
        Self {
            name: name.to_string(),
            key,
            value: uuid::Uuid::new_v4().to_string(),
            ttl,
            acquired_at: Instant::now(),
        }
    }

    /// Rebuild a token from an owner value captured elsewhere (e.g. printed by
    /// another process). The acquisition time is unknown and set to now.
    pub fn from_parts(
        name: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            value: value.into(),
            ttl,
            acquired_at: Instant::now(),
        }
    }

    /// Lock name as given by the caller
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store key (prefix + name)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Owner token stored as the key's value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// TTL requested at acquisition
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn acquired_at(&self) -> Instant {
        self.acquired_at
    }

    /// Whether the TTL requested at acquisition has elapsed locally.
    /// Clock skew means the store may disagree in either direction.
    pub fn is_past_ttl(&self) -> bool {
        self.acquired_at.elapsed() >= self.ttl
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.value)
    }
}

/// Outcome of an acquire call. Contention is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// This call created the key
    Acquired(LockToken),
    /// The key already existed
    Contended,
}

impl Acquisition {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Acquisition::Acquired(_))
    }

    pub fn token(&self) -> Option<&LockToken> {
        match self {
            Acquisition::Acquired(token) => Some(token),
            Acquisition::Contended => None,
        }
    }

    pub fn into_token(self) -> Option<LockToken> {
        match self {
            Acquisition::Acquired(token) => Some(token),
            Acquisition::Contended => None,
        }
    }
}
