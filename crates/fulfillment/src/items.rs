//! Line-item changes on open orders.

use common::{Identity, OrderId, OrderItemId, ProductId};
use domain::{NewOrderItem, Order, OrderError, OrderItem, OrderItemUpdate, OrderWithItems, Shortfall};
use store::{Store, StoreTx};

use crate::error::{FulfillmentError, Result};
use crate::hooks::{Mutation, PostCommitHooks};
use crate::ensure_can_access;

/// Adds, changes and removes lines while keeping stock and totals in step.
///
/// Each call locks the order row first and the product row second.
pub struct LineItemService<S: Store> {
    store: S,
    hooks: PostCommitHooks,
}

impl<S: Store> LineItemService<S> {
    pub fn new(store: S, hooks: PostCommitHooks) -> Self {
        Self { store, hooks }
    }

    /// Adds `quantity` of a product. A product already on the order grows
    /// its existing line.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id, order_id = %order_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        identity: Identity,
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<OrderWithItems> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id,
                quantity,
            }
            .into());
        }

        let mut tx = self.store.begin().await?;
        let mut order = lock_open_order(&mut tx, &identity, order_id).await?;

        let product = tx
            .lock_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| FulfillmentError::ProductsUnavailable {
                product_ids: vec![product_id],
            })?;
        if product.stock < quantity {
            return Err(FulfillmentError::InsufficientStock {
                shortfalls: vec![Shortfall {
                    product_id,
                    available: product.stock,
                    requested: quantity,
                }],
            });
        }

        let existing = tx
            .order_items(order_id)
            .await?
            .into_iter()
            .find(|item| item.product_id() == product_id);
        match existing {
            Some(mut item) => {
                item.add_quantity(quantity)?;
                tx.update_order_item(&item).await?;
            }
            None => {
                let line = NewOrderItem::new(product_id, quantity, product.price)?;
                tx.insert_order_items(order_id, &[line]).await?;
            }
        }
        tx.adjust_stock(product_id, -i64::from(quantity)).await?;

        let updated = finish(tx, &mut order).await?;
        self.after_commit(&updated.order, Some(product_id)).await;
        Ok(updated)
    }

    /// Changes the quantity of a line. Product and purchase price are fixed.
    #[tracing::instrument(skip(self, update), fields(user_id = %identity.user_id, order_id = %order_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        identity: Identity,
        order_id: OrderId,
        item_id: OrderItemId,
        update: OrderItemUpdate,
    ) -> Result<OrderWithItems> {
        let mut tx = self.store.begin().await?;
        let mut order = lock_open_order(&mut tx, &identity, order_id).await?;
        let mut item = find_item(&mut tx, order_id, item_id).await?;

        let delta = item.apply(update)?;
        if delta == 0 {
            let items = tx.order_items(order_id).await?;
            return Ok(OrderWithItems { order, items });
        }

        // growing a line needs an active product, shrinking one does not
        let product = tx.lock_product(item.product_id()).await?;
        if delta > 0 && !product.as_ref().is_some_and(|p| p.is_active) {
            return Err(FulfillmentError::ProductsUnavailable {
                product_ids: vec![item.product_id()],
            });
        }

        // stock moves opposite to the line quantity
        if let Some(product) = product {
            let extra = u32::try_from(delta).unwrap_or(0);
            if product.stock < extra {
                return Err(FulfillmentError::InsufficientStock {
                    shortfalls: vec![Shortfall {
                        product_id: product.id,
                        available: product.stock,
                        requested: extra,
                    }],
                });
            }
            tx.adjust_stock(product.id, -delta).await?;
        }
        tx.update_order_item(&item).await?;

        let updated = finish(tx, &mut order).await?;
        self.after_commit(&updated.order, Some(item.product_id())).await;
        Ok(updated)
    }

    /// Deletes a line and returns its quantity to stock.
    #[tracing::instrument(skip(self), fields(user_id = %identity.user_id, order_id = %order_id, item_id = %item_id))]
    pub async fn remove_item(
        &self,
        identity: Identity,
        order_id: OrderId,
        item_id: OrderItemId,
    ) -> Result<OrderWithItems> {
        let mut tx = self.store.begin().await?;
        let mut order = lock_open_order(&mut tx, &identity, order_id).await?;
        let item = find_item(&mut tx, order_id, item_id).await?;

        if tx.lock_product(item.product_id()).await?.is_some() {
            tx.adjust_stock(item.product_id(), i64::from(item.quantity()))
                .await?;
        }
        tx.delete_order_item(item_id).await?;

        let updated = finish(tx, &mut order).await?;
        self.after_commit(&updated.order, Some(item.product_id())).await;
        Ok(updated)
    }

    async fn after_commit(&self, order: &Order, product_id: Option<ProductId>) {
        let mut mutations = vec![Mutation::OrderItem {
            order_id: order.id(),
            user_id: order.user_id(),
        }];
        mutations.extend(product_id.map(Mutation::Product));
        self.hooks.run(&mutations).await;
    }
}

async fn lock_open_order<T: StoreTx>(
    tx: &mut T,
    identity: &Identity,
    order_id: OrderId,
) -> Result<Order> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or_else(|| FulfillmentError::not_found("order", order_id))?;
    ensure_can_access(identity, order.user_id())?;
    order.ensure_items_mutable()?;
    Ok(order)
}

async fn find_item<T: StoreTx>(
    tx: &mut T,
    order_id: OrderId,
    item_id: OrderItemId,
) -> Result<OrderItem> {
    tx.order_items(order_id)
        .await?
        .into_iter()
        .find(|item| item.id() == item_id)
        .ok_or_else(|| FulfillmentError::not_found("order item", item_id))
}

/// Recomputes the total from the lines as written, persists it and commits.
async fn finish<T: StoreTx>(mut tx: T, order: &mut Order) -> Result<OrderWithItems> {
    let items = tx.order_items(order.id()).await?;
    order.recalc_total(&items)?;
    tx.update_order(order).await?;
    tx.commit().await?;
    Ok(OrderWithItems {
        order: order.clone(),
        items,
    })
}

#[cfg(test)]
mod tests {
    use common::{CategoryId, UserId};
    use domain::{Money, NewCategory, NewProduct, OrderStatus};
    use store::{InMemoryStore, InMemoryTx};

    use super::*;

    struct Fixture {
        store: InMemoryStore,
        service: LineItemService<InMemoryStore>,
        owner: Identity,
        order_id: OrderId,
        laptop: ProductId,
        mouse: ProductId,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let category: CategoryId = tx
            .insert_category(NewCategory::new("Electronics", None).unwrap())
            .await
            .unwrap()
            .id;
        let laptop = insert_product(&mut tx, category, "Laptop", 500, 5).await;
        let mouse = insert_product(&mut tx, category, "Mouse", 20, 10).await;
        let owner = Identity::customer(UserId::new(1));
        let order = tx.insert_order(owner.user_id).await.unwrap();
        tx.commit().await.unwrap();

        Fixture {
            service: LineItemService::new(store.clone(), PostCommitHooks::new()),
            store,
            owner,
            order_id: order.id(),
            laptop,
            mouse,
        }
    }

    async fn insert_product(
        tx: &mut InMemoryTx,
        category_id: CategoryId,
        name: &str,
        price: i64,
        stock: u32,
    ) -> ProductId {
        tx.insert_product(NewProduct {
            name: name.into(),
            description: String::new(),
            price: Money::from_major(price),
            stock,
            category_id,
            is_active: true,
        })
        .await
        .unwrap()
        .id
    }

    async fn stock(store: &InMemoryStore, id: ProductId) -> u32 {
        store.get_product(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_add_aggregates_existing_line() {
        let f = fixture().await;

        f.service
            .add_item(f.owner, f.order_id, f.laptop, 1)
            .await
            .unwrap();
        let updated = f
            .service
            .add_item(f.owner, f.order_id, f.laptop, 2)
            .await
            .unwrap();

        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.items[0].quantity(), 3);
        assert_eq!(updated.order.total_price(), Money::from_major(1500));
        assert_eq!(stock(&f.store, f.laptop).await, 2);
    }

    #[tokio::test]
    async fn test_add_checks_stock() {
        let f = fixture().await;

        let err = f
            .service
            .add_item(f.owner, f.order_id, f.laptop, 6)
            .await
            .unwrap_err();

        assert!(matches!(err, FulfillmentError::InsufficientStock { .. }));
        assert_eq!(stock(&f.store, f.laptop).await, 5);
    }

    #[tokio::test]
    async fn test_update_adjusts_stock_by_delta() {
        let f = fixture().await;
        let added = f
            .service
            .add_item(f.owner, f.order_id, f.mouse, 4)
            .await
            .unwrap();
        let item_id = added.items[0].id();

        let updated = f
            .service
            .update_item(
                f.owner,
                f.order_id,
                item_id,
                OrderItemUpdate {
                    quantity: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.items[0].quantity(), 1);
        assert_eq!(updated.order.total_price(), Money::from_major(20));
        assert_eq!(stock(&f.store, f.mouse).await, 9);
    }

    #[tokio::test]
    async fn test_update_cannot_grow_line_of_inactive_product() {
        let f = fixture().await;
        let added = f
            .service
            .add_item(f.owner, f.order_id, f.mouse, 3)
            .await
            .unwrap();
        let item_id = added.items[0].id();

        let mut tx = f.store.begin().await.unwrap();
        let mut mouse = tx.lock_product(f.mouse).await.unwrap().unwrap();
        mouse.is_active = false;
        tx.update_product(&mouse).await.unwrap();
        tx.commit().await.unwrap();

        let quantity = |n| OrderItemUpdate {
            quantity: Some(n),
            ..Default::default()
        };
        let err = f
            .service
            .update_item(f.owner, f.order_id, item_id, quantity(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FulfillmentError::ProductsUnavailable { ref product_ids } if product_ids == &[f.mouse]
        ));
        assert_eq!(stock(&f.store, f.mouse).await, 7);

        // shrinking still returns stock
        let updated = f
            .service
            .update_item(f.owner, f.order_id, item_id, quantity(1))
            .await
            .unwrap();
        assert_eq!(updated.items[0].quantity(), 1);
        assert_eq!(stock(&f.store, f.mouse).await, 9);
    }

    #[tokio::test]
    async fn test_update_refuses_price_change() {
        let f = fixture().await;
        let added = f
            .service
            .add_item(f.owner, f.order_id, f.mouse, 1)
            .await
            .unwrap();

        let err = f
            .service
            .update_item(
                f.owner,
                f.order_id,
                added.items[0].id(),
                OrderItemUpdate {
                    price_at_purchase: Some(Money::from_major(1)),
                    quantity: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FulfillmentError::Order(OrderError::ImmutableField {
                field: "price_at_purchase"
            })
        ));
    }

    #[tokio::test]
    async fn test_remove_restores_stock() {
        let f = fixture().await;
        let added = f
            .service
            .add_item(f.owner, f.order_id, f.laptop, 2)
            .await
            .unwrap();

        let updated = f
            .service
            .remove_item(f.owner, f.order_id, added.items[0].id())
            .await
            .unwrap();

        assert!(updated.items.is_empty());
        assert_eq!(updated.order.total_price(), Money::zero());
        assert_eq!(stock(&f.store, f.laptop).await, 5);
    }

    #[tokio::test]
    async fn test_read_only_orders_are_refused() {
        let f = fixture().await;
        let mut tx = f.store.begin().await.unwrap();
        let mut order = tx.lock_order(f.order_id).await.unwrap().unwrap();
        order.transition_to(OrderStatus::Cancelled).unwrap();
        tx.update_order(&order).await.unwrap();
        tx.commit().await.unwrap();

        let err = f
            .service
            .add_item(f.owner, f.order_id, f.mouse, 1)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FulfillmentError::Order(OrderError::ReadOnly {
                status: OrderStatus::Cancelled
            })
        ));
        assert_eq!(stock(&f.store, f.mouse).await, 10);
    }

    #[tokio::test]
    async fn test_other_customers_are_refused() {
        let f = fixture().await;

        let err = f
            .service
            .add_item(Identity::customer(UserId::new(2)), f.order_id, f.mouse, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, FulfillmentError::PermissionDenied));
    }
}
