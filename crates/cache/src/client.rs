use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::{CacheError, Result};

/// A key-value cache holding serialized payloads.
///
/// Values are never edited in place; the only read-modify-write path is
/// [`CacheClientExt::incr_or_init`] for generation counters.
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value`, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Stores `value` only if `key` is absent. Returns whether it was stored.
    async fn add(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<bool>;

    /// Atomically increments an integer value and returns the new value.
    async fn incr(&self, key: &str) -> Result<i64> {
        let _ = key;
        Err(CacheError::Unsupported("incr"))
    }
}

/// Counter helpers built on top of [`CacheClient`].
#[async_trait]
pub trait CacheClientExt: CacheClient {
    /// Initializes `key` to `initial` if absent, then increments it.
    ///
    /// Backends without an atomic increment, or a key holding a non-integer,
    /// fall back to a read-modify-write. Concurrent bumps may then collapse
    /// into one, which only costs an extra cache miss.
    async fn incr_or_init(&self, key: &str, initial: i64) -> Result<i64> {
        self.add(key, &initial.to_string(), None).await?;

        match self.incr(key).await {
            Ok(value) => Ok(value),
            Err(CacheError::Unsupported(_) | CacheError::NotAnInteger { .. }) => {
                debug!(key, "Falling back to non-atomic increment");
                let current = self
                    .get(key)
                    .await?
                    .and_then(|v| v.trim().parse::<i64>().ok())
                    .unwrap_or(initial);
                let next = current.saturating_add(1);
                self.set(key, &next.to_string(), None).await?;
                Ok(next)
            }
            Err(e) => Err(e),
        }
    }
}

impl<T: CacheClient + ?Sized> CacheClientExt for T {}
