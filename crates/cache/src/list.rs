use std::future::Future;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument};

use crate::{
    CacheClient, CacheClientExt, Cached, ListResource, QueryParams, Result, TtlPolicy,
    lookup::{self, record_error, record_lookup},
};

/// Caches list responses under keys that embed a per-resource generation.
///
/// Bumping the generation makes every cached variant of the list
/// unreachable at once; stale entries simply expire.
#[derive(Clone)]
pub struct VersionedListCache {
    client: Arc<dyn CacheClient>,
    ttl: TtlPolicy,
}

impl VersionedListCache {
    pub fn new(client: Arc<dyn CacheClient>, ttl: TtlPolicy) -> Self {
        Self { client, ttl }
    }

    /// Current generation. Missing, invalid or unreadable counters read as 1.
    pub async fn generation(&self, resource: ListResource) -> i64 {
        let key = resource.version_key();
        match self.client.get(&key).await {
            Ok(value) => value
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(1),
            Err(e) => {
                record_error("get", &key, &e);
                1
            }
        }
    }

    /// `{prefix}:list:v{generation}:{digest}`
    pub async fn key(&self, resource: ListResource, params: &QueryParams) -> String {
        let generation = self.generation(resource).await;
        format!(
            "{}:list:v{generation}:{}",
            resource.prefix(),
            params.digest()
        )
    }

    /// Returns the cached payload for these parameters, or runs `load` and
    /// caches its result.
    ///
    /// Cache failures never surface; only `load` errors are returned.
    #[instrument(skip(self, params, load), fields(resource = resource.label()))]
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        resource: ListResource,
        params: &QueryParams,
        load: F,
    ) -> std::result::Result<Cached<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let key = self.key(resource, params).await;

        if let Some(value) = lookup::fetch(self.client.as_ref(), &key).await {
            record_lookup(resource.label(), true);
            return Ok(Cached::hit(value));
        }

        record_lookup(resource.label(), false);
        let value = load().await?;
        lookup::store(self.client.as_ref(), &key, &value, self.ttl.sample()).await;
        Ok(Cached::miss(value))
    }

    /// Advances the generation and returns the new value.
    pub async fn bump(&self, resource: ListResource) -> Result<i64> {
        let generation = self.client.incr_or_init(&resource.version_key(), 1).await?;
        debug!(resource = resource.label(), generation, "List generation bumped");
        Ok(generation)
    }
}
