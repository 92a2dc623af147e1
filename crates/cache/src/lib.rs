//! Cache facade for the online store.
//!
//! - [`CacheClient`]: the key-value backend ([`InMemoryCache`], [`RedisCache`])
//! - [`VersionedListCache`]: list responses keyed by a generation counter
//! - [`EntityDetailCache`]: single-entity views keyed by id
//! - [`TtlPolicy`]: expiry with jitter

pub mod client;
pub mod detail;
pub mod error;
pub mod key;
pub mod list;
mod lookup;
pub mod memory;
pub mod redis_cache;
pub mod resource;
pub mod ttl;

pub use client::{CacheClient, CacheClientExt};
pub use detail::EntityDetailCache;
pub use error::{CacheError, Result};
pub use key::QueryParams;
pub use list::VersionedListCache;
pub use memory::InMemoryCache;
pub use redis_cache::RedisCache;
pub use resource::{DetailResource, ListResource};
pub use ttl::TtlPolicy;

/// Whether a response was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` response header.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A value together with its cache status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    pub value: T,
    pub status: CacheStatus,
}

impl<T> Cached<T> {
    pub fn hit(value: T) -> Self {
        Self {
            value,
            status: CacheStatus::Hit,
        }
    }

    pub fn miss(value: T) -> Self {
        Self {
            value,
            status: CacheStatus::Miss,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cached<U> {
        Cached {
            value: f(self.value),
            status: self.status,
        }
    }
}
