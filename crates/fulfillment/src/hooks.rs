//! Post-commit hooks.
//!
//! Every mutating service reports what it changed as a list of [`Mutation`]s
//! and runs its [`PostCommitHooks`] once the transaction has committed. A
//! rolled-back transaction never reaches the hooks.

use std::sync::Arc;

use async_trait::async_trait;
use cache::{DetailResource, EntityDetailCache, ListResource, VersionedListCache};
use common::{CategoryId, OrderId, ProductId, UserId};

/// A committed change to one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    Category(CategoryId),
    Product(ProductId),
    Order { order_id: OrderId, user_id: UserId },
    /// A line was added, changed or removed.
    OrderItem { order_id: OrderId, user_id: UserId },
}

/// Side effect run after a successful commit.
///
/// Hooks cannot fail the request: the data is already committed.
#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after_commit(&self, mutations: &[Mutation]);
}

/// The ordered hook list a service runs after each commit.
#[derive(Clone, Default)]
pub struct PostCommitHooks {
    hooks: Vec<Arc<dyn PostCommitHook>>,
}

impl PostCommitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook. Hooks run in registration order.
    pub fn with(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn run(&self, mutations: &[Mutation]) {
        if mutations.is_empty() {
            return;
        }
        for hook in &self.hooks {
            tracing::debug!(hook = hook.name(), count = mutations.len(), "running post-commit hook");
            hook.after_commit(mutations).await;
        }
    }
}

/// Cache keys to drop and list generations to bump for a set of mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub details: Vec<(DetailResource, i64)>,
    pub lists: Vec<ListResource>,
}

impl InvalidationPlan {
    /// Builds a deduplicated plan, keeping first-seen order.
    pub fn from_mutations(mutations: &[Mutation]) -> Self {
        let mut plan = Self::default();
        for mutation in mutations {
            match *mutation {
                Mutation::Category(id) => {
                    plan.detail(DetailResource::Category, id.get());
                    plan.list(ListResource::Categories);
                    // product listings filter on the category slug
                    plan.list(ListResource::Products);
                }
                Mutation::Product(id) => {
                    plan.detail(DetailResource::Product, id.get());
                    plan.list(ListResource::Products);
                }
                Mutation::Order { order_id, user_id }
                | Mutation::OrderItem { order_id, user_id } => {
                    plan.detail(DetailResource::Order, order_id.get());
                    plan.list(ListResource::UserOrders(user_id));
                    plan.list(ListResource::AdminOrders);
                }
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty() && self.lists.is_empty()
    }

    fn detail(&mut self, resource: DetailResource, id: i64) {
        if !self.details.contains(&(resource, id)) {
            self.details.push((resource, id));
        }
    }

    fn list(&mut self, resource: ListResource) {
        if !self.lists.contains(&resource) {
            self.lists.push(resource);
        }
    }
}

/// Drops detail entries and bumps list generations touched by a commit.
#[derive(Clone)]
pub struct CacheInvalidationHook {
    lists: VersionedListCache,
    details: EntityDetailCache,
}

impl CacheInvalidationHook {
    pub fn new(lists: VersionedListCache, details: EntityDetailCache) -> Self {
        Self { lists, details }
    }

    /// Runs every step of the plan. A failed step is logged and counted and
    /// the remaining steps still run.
    pub async fn execute(&self, plan: &InvalidationPlan) {
        for (resource, id) in &plan.details {
            if let Err(e) = self.details.invalidate(*resource, *id).await {
                metrics::counter!("cache_errors_total", "op" => "invalidate").increment(1);
                tracing::warn!(resource = resource.as_str(), id, error = %e, "detail invalidation failed");
            }
        }
        for resource in &plan.lists {
            if let Err(e) = self.lists.bump(*resource).await {
                metrics::counter!("cache_errors_total", "op" => "bump").increment(1);
                tracing::warn!(resource = resource.label(), error = %e, "list generation bump failed");
            }
        }
    }
}

#[async_trait]
impl PostCommitHook for CacheInvalidationHook {
    fn name(&self) -> &'static str {
        "cache_invalidation"
    }

    async fn after_commit(&self, mutations: &[Mutation]) {
        self.execute(&InvalidationPlan::from_mutations(mutations)).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use cache::{CacheClient, InMemoryCache, QueryParams, TtlPolicy};

    use super::*;

    #[test]
    fn test_plan_deduplicates() {
        let order = Mutation::Order {
            order_id: OrderId::new(3),
            user_id: UserId::new(9),
        };
        let item = Mutation::OrderItem {
            order_id: OrderId::new(3),
            user_id: UserId::new(9),
        };
        let plan = InvalidationPlan::from_mutations(&[
            order,
            item,
            Mutation::Product(ProductId::new(1)),
            Mutation::Product(ProductId::new(2)),
        ]);

        assert_eq!(
            plan.details,
            vec![
                (DetailResource::Order, 3),
                (DetailResource::Product, 1),
                (DetailResource::Product, 2),
            ]
        );
        assert_eq!(
            plan.lists,
            vec![
                ListResource::UserOrders(UserId::new(9)),
                ListResource::AdminOrders,
                ListResource::Products,
            ]
        );
    }

    #[test]
    fn test_category_change_bumps_products() {
        let plan = InvalidationPlan::from_mutations(&[Mutation::Category(CategoryId::new(4))]);
        assert_eq!(plan.details, vec![(DetailResource::Category, 4)]);
        assert_eq!(
            plan.lists,
            vec![ListResource::Categories, ListResource::Products]
        );
    }

    #[tokio::test]
    async fn test_hook_drops_detail_and_bumps_lists() {
        let backend = InMemoryCache::new();
        let client: Arc<dyn CacheClient> = Arc::new(backend.clone());
        let lists = VersionedListCache::new(client.clone(), TtlPolicy::catalog());
        let details = EntityDetailCache::new(client, TtlPolicy::catalog());
        backend.set("product:1", "{}", None).await.unwrap();
        let before = lists.key(ListResource::Products, &QueryParams::default()).await;

        let hook = CacheInvalidationHook::new(lists.clone(), details);
        hook.after_commit(&[Mutation::Product(ProductId::new(1))])
            .await;

        assert!(!backend.contains_key("product:1").await);
        let after = lists.key(ListResource::Products, &QueryParams::default()).await;
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn test_hook_survives_unavailable_cache() {
        let backend = InMemoryCache::new();
        let client: Arc<dyn CacheClient> = Arc::new(backend.clone());
        let hook = CacheInvalidationHook::new(
            VersionedListCache::new(client.clone(), TtlPolicy::catalog()),
            EntityDetailCache::new(client, TtlPolicy::catalog()),
        );
        backend.set_unavailable(true);

        hook.after_commit(&[Mutation::Category(CategoryId::new(1))])
            .await;
    }

    struct Recorder(Mutex<Vec<Mutation>>);

    #[async_trait]
    impl PostCommitHook for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn after_commit(&self, mutations: &[Mutation]) {
            self.0.lock().unwrap().extend_from_slice(mutations);
        }
    }

    #[tokio::test]
    async fn test_hooks_skip_empty_batches() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let hooks = PostCommitHooks::new().with(recorder.clone());

        hooks.run(&[]).await;
        assert!(recorder.0.lock().unwrap().is_empty());

        hooks.run(&[Mutation::Product(ProductId::new(5))]).await;
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }
}
