use std::future::Future;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use tracing::instrument;

use crate::{
    CacheClient, Cached, DetailResource, Result, TtlPolicy,
    lookup::{self, record_lookup},
};

/// Caches single-entity views under `{resource}:{id}`.
#[derive(Clone)]
pub struct EntityDetailCache {
    client: Arc<dyn CacheClient>,
    ttl: TtlPolicy,
}

impl EntityDetailCache {
    pub fn new(client: Arc<dyn CacheClient>, ttl: TtlPolicy) -> Self {
        Self { client, ttl }
    }

    /// Returns the cached view, or runs `load` and caches what it returns.
    ///
    /// `load` yields `None` for absent or non-public entities; nothing is
    /// cached for them.
    #[instrument(skip(self, load), fields(resource = resource.as_str()))]
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        resource: DetailResource,
        id: i64,
        load: F,
    ) -> std::result::Result<Option<Cached<T>>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<T>, E>>,
    {
        let key = resource.key(id);

        if let Some(value) = lookup::fetch(self.client.as_ref(), &key).await {
            record_lookup(resource.as_str(), true);
            return Ok(Some(Cached::hit(value)));
        }

        record_lookup(resource.as_str(), false);
        let Some(value) = load().await? else {
            return Ok(None);
        };
        lookup::store(self.client.as_ref(), &key, &value, self.ttl.sample()).await;
        Ok(Some(Cached::miss(value)))
    }

    pub async fn invalidate(&self, resource: DetailResource, id: i64) -> Result<()> {
        self.client.delete(&resource.key(id)).await
    }
}
