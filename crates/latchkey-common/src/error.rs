//! Error types for Latchkey
//!
//! Contention is not an error: a lock that is already held is reported through
//! the normal return value of an acquire call. Everything here is either a store
//! problem or a caller problem.

/// Lock and store error types
#[derive(thiserror::Error, Debug)]
pub enum LatchError {
    /// The store could not be reached or did not answer in time. The outcome of
    /// the operation is unknown: it may have been applied server-side.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store answered, but with an error
    #[error("store error: {0}")]
    Store(String),

    #[error("lock ttl must be greater than zero")]
    InvalidTtl,

    /// A guarded lock expired or was taken over while still in use
    #[error("lock '{name}' was lost before release")]
    StaleLock { name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LatchError {
    /// Whether the failed operation may still have taken effect in the store
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, LatchError::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, LatchError>;
