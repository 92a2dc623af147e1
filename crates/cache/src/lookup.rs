//! Read-through plumbing shared by the list and detail caches.

use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::{CacheClient, CacheError};

pub(crate) fn record_error(op: &'static str, key: &str, error: &CacheError) {
    metrics::counter!("cache_errors_total", "op" => op).increment(1);
    warn!(key, op, error = %error, "Cache operation failed, continuing without cache");
}

pub(crate) fn record_lookup(resource: &'static str, hit: bool) {
    let status = if hit { "hit" } else { "miss" };
    metrics::counter!("cache_lookups_total", "resource" => resource, "status" => status)
        .increment(1);
}

/// Reads and decodes a cached payload. Any failure reads as a miss.
pub(crate) async fn fetch<T: DeserializeOwned>(client: &dyn CacheClient, key: &str) -> Option<T> {
    let raw = match client.get(key).await {
        Ok(raw) => raw?,
        Err(e) => {
            record_error("get", key, &e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            record_error("decode", key, &CacheError::Serialization(e));
            None
        }
    }
}

/// Encodes and stores a payload. Failures are logged and swallowed.
pub(crate) async fn store<T: Serialize>(
    client: &dyn CacheClient,
    key: &str,
    value: &T,
    ttl: Duration,
) {
    let encoded = match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(e) => {
            record_error("encode", key, &CacheError::Serialization(e));
            return;
        }
    };

    if let Err(e) = client.set(key, &encoded, Some(ttl)).await {
        record_error("set", key, &e);
    }
}
