//! Ephemeral key-value storage with TTL-based expiry.
//!
//! Session bindings and email verification codes live here instead of the
//! relational database. Entries expire on their own; nothing sweeps them.
//!
//! ## Key Patterns
//!
//! ```text
//! user_token:{user_id}     → currently valid session token (24h)
//! email:verify:{email}     → outstanding verification code (5 min)
//! ```
//!
//! Two implementations are provided:
//! - [`RedisStore`] for production
//! - [`MemoryStore`] for tests and single-process development

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::error::ErrorKind;

/// Key-value store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis command or connection failure
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    /// Store refused or could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::DependencyFailure
    }

    /// Message safe to return to clients
    pub fn client_message(&self) -> String {
        "Internal server error".to_string()
    }
}

/// Result type for key-value store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Operations the core needs from a key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` at `key`, replacing any previous value and TTL
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Store `value` at `key` only if the key is absent.
    ///
    /// Returns `false` without touching the existing value or its TTL when
    /// the key is already live.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Fetch the value at `key`, `None` if absent or expired
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Remove `key`; removing an absent key is not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Remove `key` only if it currently holds `expected`.
    ///
    /// Returns `true` for exactly one of any number of concurrent callers
    /// racing on the same value.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Whether `key` holds a live value
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Remaining lifetime of `key`, `None` if absent
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Round-trip check used by health endpoints
    async fn ping(&self) -> StoreResult<()>;
}

/// Whole seconds for a TTL, rounding sub-second remainders up.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 || secs == 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_secs_rounds_up() {
        assert_eq!(ttl_secs(Duration::from_secs(300)), 300);
        assert_eq!(ttl_secs(Duration::from_millis(1500)), 2);
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }

    #[test]
    fn test_store_error_is_dependency_failure() {
        let err = StoreError::Unavailable("down".to_string());
        assert_eq!(err.kind(), ErrorKind::DependencyFailure);
        assert!(err.to_string().contains("down"));
    }
}
