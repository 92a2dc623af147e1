//! Persisted order status transitions.

use std::sync::Arc;

use common::{Identity, OrderId};
use domain::{Order, OrderStatus, Transition};
use store::{Store, StoreTx};

use crate::error::{FulfillmentError, Result};
use crate::hooks::{Mutation, PostCommitHooks};
use crate::tasks::{Task, TaskQueue, enqueue_after_commit};
use crate::ensure_can_access;

/// Applies status changes to persisted orders.
pub struct OrderStateMachine<S: Store> {
    store: S,
    hooks: PostCommitHooks,
    tasks: Arc<dyn TaskQueue>,
}

impl<S: Store> OrderStateMachine<S> {
    pub fn new(store: S, hooks: PostCommitHooks, tasks: Arc<dyn TaskQueue>) -> Self {
        Self {
            store,
            hooks,
            tasks,
        }
    }

    /// Moves an order to `target` and returns it as persisted.
    ///
    /// The check runs against the locked row, never a cached copy.
    /// Requesting the current status writes nothing and schedules nothing.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id, order_id = %order_id, to = %target))]
    pub async fn transition(
        &self,
        identity: Identity,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let mut order = tx
            .lock_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("order", order_id))?;
        ensure_can_access(&identity, order.user_id())?;

        let Transition::Changed { from, to } = order.transition_to(target)? else {
            tracing::debug!("status unchanged");
            return Ok(order);
        };
        tx.update_order(&order).await?;
        tx.commit().await?;

        metrics::counter!("order_status_transitions_total", "to" => to.as_str()).increment(1);
        tracing::info!(%from, %to, "order status changed");

        self.hooks
            .run(&[Mutation::Order {
                order_id,
                user_id: order.user_id(),
            }])
            .await;
        if to == OrderStatus::Shipped {
            enqueue_after_commit(self.tasks.as_ref(), Task::NotifyShipment { order_id });
        }

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use common::UserId;
    use domain::OrderError;
    use store::InMemoryStore;

    use super::*;
    use crate::tasks::RecordingTaskQueue;

    async fn seed_order(store: &InMemoryStore, owner: UserId) -> OrderId {
        let mut tx = store.begin().await.unwrap();
        let order = tx.insert_order(owner).await.unwrap();
        tx.commit().await.unwrap();
        order.id()
    }

    fn machine(store: &InMemoryStore, queue: &RecordingTaskQueue) -> OrderStateMachine<InMemoryStore> {
        OrderStateMachine::new(store.clone(), PostCommitHooks::new(), Arc::new(queue.clone()))
    }

    #[tokio::test]
    async fn test_ship_enqueues_exactly_one_notification() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let owner = UserId::new(1);
        let order_id = seed_order(&store, owner).await;
        let machine = machine(&store, &queue);
        let staff = Identity::staff(UserId::new(99));

        machine
            .transition(staff, order_id, OrderStatus::Processing)
            .await
            .unwrap();
        assert!(queue.tasks().is_empty());

        let shipped = machine
            .transition(staff, order_id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.status(), OrderStatus::Shipped);

        // repeated request is a no-op
        machine
            .transition(staff, order_id, OrderStatus::Shipped)
            .await
            .unwrap();

        assert_eq!(queue.count(Task::NotifyShipment { order_id }), 1);
        assert_eq!(queue.tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_status() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let owner = UserId::new(1);
        let order_id = seed_order(&store, owner).await;
        let machine = machine(&store, &queue);
        let identity = Identity::customer(owner);

        for status in [OrderStatus::Processing, OrderStatus::Shipped] {
            machine.transition(identity, order_id, status).await.unwrap();
        }
        let err = machine
            .transition(identity, order_id, OrderStatus::Pending)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FulfillmentError::Order(OrderError::InvalidTransition {
                from: OrderStatus::Shipped,
                to: OrderStatus::Pending
            })
        ));
        let stored = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_other_customers_are_refused() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();
        let order_id = seed_order(&store, UserId::new(1)).await;

        let err = machine(&store, &queue)
            .transition(
                Identity::customer(UserId::new(2)),
                order_id,
                OrderStatus::Cancelled,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FulfillmentError::PermissionDenied));
        let stored = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_order() {
        let store = InMemoryStore::new();
        let queue = RecordingTaskQueue::new();

        let err = machine(&store, &queue)
            .transition(
                Identity::staff(UserId::new(1)),
                OrderId::new(5),
                OrderStatus::Processing,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FulfillmentError::NotFound {
                entity: "order",
                id: 5
            }
        ));
    }
}
