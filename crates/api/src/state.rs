//! Shared application state.

use std::sync::Arc;

use cache::{CacheClient, EntityDetailCache, VersionedListCache};
use fulfillment::tasks::FailedTasks;
use fulfillment::{
    CacheInvalidationHook, CatalogService, LineItemService, OrderStateMachine, PostCommitHooks,
    ReservationTransactor, TaskQueue,
};
use queries::{CatalogQueries, OrderQueries};
use store::Store;

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub reservations: ReservationTransactor<S>,
    pub status: OrderStateMachine<S>,
    pub items: LineItemService<S>,
    pub catalog: CatalogService<S>,
    pub catalog_reads: CatalogQueries<S>,
    pub order_reads: OrderQueries<S>,
    /// Dead-letter list of the task workers.
    pub failed_tasks: FailedTasks,
}

impl<S: Store + Clone> AppState<S> {
    /// Wires every service to one store and one cache backend.
    pub fn new(
        store: S,
        cache: Arc<dyn CacheClient>,
        config: &Config,
        tasks: Arc<dyn TaskQueue>,
        failed_tasks: FailedTasks,
    ) -> Self {
        let catalog_lists = VersionedListCache::new(cache.clone(), config.catalog_ttl());
        let catalog_details = EntityDetailCache::new(cache.clone(), config.catalog_ttl());
        let order_lists = VersionedListCache::new(cache.clone(), config.orders_ttl());
        let order_details = EntityDetailCache::new(cache, config.orders_ttl());

        let hooks = PostCommitHooks::new().with(Arc::new(CacheInvalidationHook::new(
            order_lists.clone(),
            order_details.clone(),
        )));

        Self {
            reservations: ReservationTransactor::new(store.clone(), hooks.clone(), tasks.clone()),
            status: OrderStateMachine::new(store.clone(), hooks.clone(), tasks),
            items: LineItemService::new(store.clone(), hooks.clone()),
            catalog: CatalogService::new(store.clone(), hooks),
            catalog_reads: CatalogQueries::new(store.clone(), catalog_lists, catalog_details),
            order_reads: OrderQueries::new(store, order_lists, order_details),
            failed_tasks,
        }
    }
}
