//! Order creation with atomic stock reservation.

use std::sync::Arc;
use std::time::Instant;

use common::Identity;
use domain::{NewOrderItem, OrderWithItems, RequestedLine, ReservationRequest};
use store::{Store, StoreTx};

use crate::error::{FulfillmentError, Result};
use crate::hooks::{Mutation, PostCommitHooks};
use crate::tasks::{Task, TaskQueue, enqueue_after_commit};

/// Creates orders, reserving stock for every line in one transaction.
///
/// Product rows are locked in ascending id order, so concurrent requests
/// for overlapping products serialize instead of deadlocking, and stock can
/// never be oversold.
pub struct ReservationTransactor<S: Store> {
    store: S,
    hooks: PostCommitHooks,
    tasks: Arc<dyn TaskQueue>,
}

impl<S: Store> ReservationTransactor<S> {
    pub fn new(store: S, hooks: PostCommitHooks, tasks: Arc<dyn TaskQueue>) -> Self {
        Self {
            store,
            hooks,
            tasks,
        }
    }

    /// Creates a pending order for the caller.
    ///
    /// Duplicate products are merged into one line. Nothing is written when
    /// any product is unavailable or short on stock.
    #[tracing::instrument(skip(self, lines), fields(user_id = %identity.user_id, lines = lines.len()))]
    pub async fn reserve(
        &self,
        identity: Identity,
        lines: Vec<RequestedLine>,
    ) -> Result<OrderWithItems> {
        let start = Instant::now();
        let result = self.reserve_in_tx(identity, lines).await;
        metrics::histogram!("reservation_duration_seconds").record(start.elapsed().as_secs_f64());

        let created = match result {
            Ok(created) => created,
            Err(e) => {
                metrics::counter!("reservations_rejected_total", "reason" => e.reason())
                    .increment(1);
                tracing::info!(reason = e.reason(), error = %e, "reservation rejected");
                return Err(e);
            }
        };

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %created.order.id(),
            total = %created.order.total_price(),
            "order created"
        );

        let order_id = created.order.id();
        let user_id = created.order.user_id();
        let mut mutations = vec![
            Mutation::Order { order_id, user_id },
            Mutation::OrderItem { order_id, user_id },
        ];
        mutations.extend(created.items.iter().map(|i| Mutation::Product(i.product_id())));
        self.hooks.run(&mutations).await;
        enqueue_after_commit(self.tasks.as_ref(), Task::GenerateReceipt { order_id });

        Ok(created)
    }

    async fn reserve_in_tx(
        &self,
        identity: Identity,
        lines: Vec<RequestedLine>,
    ) -> Result<OrderWithItems> {
        let request = ReservationRequest::new(lines)?;

        let mut tx = self.store.begin().await?;
        let products = tx.lock_active_products(&request.product_ids()).await?;

        let missing = request.missing_from(&products);
        if !missing.is_empty() {
            return Err(FulfillmentError::ProductsUnavailable {
                product_ids: missing,
            });
        }
        let shortfalls = request.shortfalls(&products);
        if !shortfalls.is_empty() {
            return Err(FulfillmentError::InsufficientStock { shortfalls });
        }

        let mut order = tx.insert_order(identity.user_id).await?;
        let mut new_items = Vec::with_capacity(products.len());
        for product in &products {
            let Some(quantity) = request.quantity_of(product.id) else {
                continue;
            };
            tx.adjust_stock(product.id, -i64::from(quantity)).await?;
            new_items.push(NewOrderItem::new(product.id, quantity, product.price)?);
        }

        let items = tx.insert_order_items(order.id(), &new_items).await?;
        order.recalc_total(&items)?;
        tx.update_order(&order).await?;
        tx.commit().await?;

        Ok(OrderWithItems { order, items })
    }
}

#[cfg(test)]
mod tests {
    use common::{CategoryId, ProductId, UserId};
    use domain::{Money, NewCategory, NewProduct, OrderError, OrderStatus};
    use store::InMemoryStore;

    use super::*;
    use crate::tasks::RecordingTaskQueue;

    async fn seed(store: &InMemoryStore, products: &[(i64, u32, bool)]) -> Vec<ProductId> {
        let mut tx = store.begin().await.unwrap();
        let category: CategoryId = tx
            .insert_category(NewCategory::new("Electronics", None).unwrap())
            .await
            .unwrap()
            .id;
        let mut ids = Vec::new();
        for (i, (price, stock, active)) in products.iter().enumerate() {
            let product = tx
                .insert_product(NewProduct {
                    name: format!("Product {i}"),
                    description: String::new(),
                    price: Money::from_major(*price),
                    stock: *stock,
                    category_id: category,
                    is_active: *active,
                })
                .await
                .unwrap();
            ids.push(product.id);
        }
        tx.commit().await.unwrap();
        ids
    }

    fn transactor(store: &InMemoryStore, queue: &RecordingTaskQueue) -> ReservationTransactor<InMemoryStore> {
        ReservationTransactor::new(store.clone(), PostCommitHooks::new(), Arc::new(queue.clone()))
    }

    fn line(product_id: ProductId, quantity: u32) -> RequestedLine {
        RequestedLine {
            product_id,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_reserve_decrements_stock_and_totals() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let ids = seed(&store, &[(500, 5, true), (20, 10, true)]).await;

        let created = transactor(&store, &queue)
            .reserve(
                Identity::customer(UserId::new(1)),
                vec![line(ids[0], 2), line(ids[1], 3)],
            )
            .await
            .unwrap();

        assert_eq!(created.order.status(), OrderStatus::Pending);
        assert_eq!(created.order.total_price(), Money::from_major(1060));
        assert_eq!(created.items.len(), 2);
        assert_eq!(store.get_product(ids[0]).await.unwrap().unwrap().stock, 3);
        assert_eq!(store.get_product(ids[1]).await.unwrap().unwrap().stock, 7);
        assert_eq!(
            queue.tasks(),
            vec![Task::GenerateReceipt {
                order_id: created.order.id()
            }]
        );
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_merged() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let ids = seed(&store, &[(10, 10, true)]).await;

        let created = transactor(&store, &queue)
            .reserve(
                Identity::customer(UserId::new(1)),
                vec![line(ids[0], 2), line(ids[0], 3)],
            )
            .await
            .unwrap();

        assert_eq!(created.items.len(), 1);
        assert_eq!(created.items[0].quantity(), 5);
        assert_eq!(store.get_product(ids[0]).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_products_are_reported() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let ids = seed(&store, &[(10, 10, true), (10, 10, false)]).await;

        let err = transactor(&store, &queue)
            .reserve(
                Identity::customer(UserId::new(1)),
                vec![line(ids[0], 1), line(ids[1], 1), line(ProductId::new(99), 1)],
            )
            .await
            .unwrap_err();

        match err {
            FulfillmentError::ProductsUnavailable { product_ids } => {
                assert_eq!(product_ids, vec![ids[1], ProductId::new(99)]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.get_product(ids[0]).await.unwrap().unwrap().stock, 10);
        assert!(queue.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_every_shortfall_is_reported() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let ids = seed(&store, &[(10, 1, true), (10, 5, true), (10, 0, true)]).await;

        let err = transactor(&store, &queue)
            .reserve(
                Identity::customer(UserId::new(1)),
                vec![line(ids[0], 2), line(ids[1], 5), line(ids[2], 1)],
            )
            .await
            .unwrap_err();

        let FulfillmentError::InsufficientStock { shortfalls } = err else {
            panic!("expected insufficient stock");
        };
        assert_eq!(shortfalls.len(), 2);
        assert_eq!(shortfalls[0].product_id, ids[0]);
        assert_eq!((shortfalls[0].available, shortfalls[0].requested), (1, 2));
        assert_eq!(shortfalls[1].product_id, ids[2]);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_validation_happens_before_locking() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let transactor = transactor(&store, &queue);

        let empty = transactor
            .reserve(Identity::customer(UserId::new(1)), vec![])
            .await
            .unwrap_err();
        assert!(matches!(empty, FulfillmentError::Order(domain::OrderError::EmptyOrder)));

        let zero = transactor
            .reserve(
                Identity::customer(UserId::new(1)),
                vec![line(ProductId::new(1), 0)],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            zero,
            FulfillmentError::Order(domain::OrderError::InvalidQuantity { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_no_trace() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let ids = seed(&store, &[(10, 10, true)]).await;
        store.set_fail_on_commit(true);

        let result = transactor(&store, &queue)
            .reserve(Identity::customer(UserId::new(1)), vec![line(ids[0], 4)])
            .await;

        assert!(result.is_err());
        store.set_fail_on_commit(false);
        assert_eq!(store.get_product(ids[0]).await.unwrap().unwrap().stock, 10);
        assert_eq!(store.order_count().await, 0);
        assert!(queue.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_closed_queue_does_not_fail_the_order() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        queue.set_closed(true);
        let ids = seed(&store, &[(10, 10, true)]).await;

        let created = transactor(&store, &queue)
            .reserve(Identity::customer(UserId::new(1)), vec![line(ids[0], 1)])
            .await;

        assert!(created.is_ok());
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_total_overflow_rolls_back() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let ids = seed(&store, &[(99_999_999, 500, true)]).await;

        let err = transactor(&store, &queue)
            .reserve(Identity::customer(UserId::new(1)), vec![line(ids[0], 200)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FulfillmentError::Order(OrderError::TotalOverflow { .. })
        ));
        assert_eq!(store.get_product(ids[0]).await.unwrap().unwrap().stock, 500);
        assert_eq!(store.order_count().await, 0);
        assert!(queue.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_price_at_purchase_is_captured() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let ids = seed(&store, &[(42, 10, true)]).await;

        let created = transactor(&store, &queue)
            .reserve(Identity::customer(UserId::new(1)), vec![line(ids[0], 1)])
            .await
            .unwrap();

        assert_eq!(created.items[0].price_at_purchase(), Money::from_major(42));
    }
}
