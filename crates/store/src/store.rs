use async_trait::async_trait;
use common::{CategoryId, OrderId, OrderItemId, ProductId, UserId};
use domain::{Category, NewCategory, NewOrderItem, NewProduct, Order, OrderItem, Product};

use crate::{CategoryFilter, OrderFilter, OrderListing, ProductFilter, Result};

/// The store of record.
///
/// Reads on the store itself see committed data only. Every mutation goes
/// through a [`StoreTx`] obtained from [`Store::begin`].
///
/// Transactions that lock more than one kind of row must take them in the
/// order categories, orders, products, each by ascending id.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: StoreTx;

    /// Starts a transaction. Dropping it without committing rolls it back.
    async fn begin(&self) -> Result<Self::Tx>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>>;

    /// Categories ordered by lower-case name.
    async fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<Category>>;

    async fn get_categories(&self, ids: &[CategoryId]) -> Result<Vec<Category>>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Products with the given ids, in ascending id order. Unknown ids are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Products ordered by lower-case name.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lines of an order in ascending id order.
    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderListing>;

    /// Orders with a line for `product_id`, in ascending id order.
    async fn orders_with_product(&self, product_id: ProductId) -> Result<Vec<Order>>;
}

/// An open transaction.
///
/// `lock_*` methods take an exclusive row lock held until commit or drop, and
/// return the row as currently committed (plus this transaction's own writes).
#[async_trait]
pub trait StoreTx: Send {
    // Categories

    async fn lock_category(&mut self, id: CategoryId) -> Result<Option<Category>>;

    async fn insert_category(&mut self, category: NewCategory) -> Result<Category>;

    async fn update_category(&mut self, category: &Category) -> Result<Category>;

    /// Hard delete. Fails with a constraint error while products reference it.
    async fn delete_category(&mut self, id: CategoryId) -> Result<()>;

    async fn count_products_in_category(&mut self, id: CategoryId) -> Result<u64>;

    // Products

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Locks the active products among `ids` in ascending id order.
    async fn lock_active_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>>;

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product>;

    async fn update_product(&mut self, product: &Product) -> Result<Product>;

    /// Adds `delta` to the stock and returns the new value.
    ///
    /// A result below zero fails with a constraint error.
    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> Result<u32>;

    // Orders

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts a pending order with a zero total.
    async fn insert_order(&mut self, user_id: UserId) -> Result<Order>;

    /// Persists status and total.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>>;

    /// Persists the quantity of an existing line.
    async fn update_order_item(&mut self, item: &OrderItem) -> Result<()>;

    async fn delete_order_item(&mut self, id: OrderItemId) -> Result<()>;

    /// Makes every write durable and releases the locks.
    async fn commit(self) -> Result<()>;
}
