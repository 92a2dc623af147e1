use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use common::{CategoryId, OrderId, OrderItemId, ProductId, UserId};
use domain::{
    Category, Money, NewCategory, NewOrderItem, NewProduct, Order, OrderItem, OrderStatus, Product,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    CategoryFilter, OrderFilter, OrderListing, OrderRow, OrderSort, OrderSortField,
    ProductFilter, Result, StoreError,
    error::constraint,
    store::{Store, StoreTx},
};

/// In-memory store implementation for testing and local runs.
///
/// Row locks are real async mutexes held by the transaction until commit or
/// drop, so concurrent transactions serialize on shared rows the same way
/// they do against PostgreSQL. Constraints are checked at commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    tables: RwLock<Tables>,
    locks: RowLocks,
    sequences: Sequences,
    fail_on_commit: AtomicBool,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    items: BTreeMap<OrderItemId, OrderItem>,
}

#[derive(Default)]
struct Sequences {
    category: AtomicI64,
    product: AtomicI64,
    order: AtomicI64,
    item: AtomicI64,
}

impl Sequences {
    fn next(counter: &AtomicI64) -> i64 {
        counter.fetch_add(1, AtomicOrdering::SeqCst) + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RowKey {
    Category(CategoryId),
    Order(OrderId),
    Product(ProductId),
}

#[derive(Default)]
struct RowLocks {
    rows: StdMutex<HashMap<RowKey, Arc<Mutex<()>>>>,
}

impl RowLocks {
    fn handle(&self, key: RowKey) -> Arc<Mutex<()>> {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        rows.entry(key).or_default().clone()
    }
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent commit fail, leaving the tables untouched.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.inner.fail_on_commit.store(fail, AtomicOrdering::SeqCst);
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.inner.tables.read().await.orders.len()
    }

    /// Returns the number of committed order lines.
    pub async fn order_item_count(&self) -> usize {
        self.inner.tables.read().await.items.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> Result<InMemoryTx> {
        Ok(InMemoryTx {
            inner: Arc::clone(&self.inner),
            guards: HashMap::new(),
            writes: WriteSet::default(),
        })
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(self.inner.tables.read().await.categories.get(&id).cloned())
    }

    async fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<Category>> {
        let tables = self.inner.tables.read().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);

        let mut categories: Vec<_> = tables
            .categories
            .values()
            .filter(|c| !filter.active_only || c.is_active)
            .filter(|c| contains_ci(&c.name, needle.as_deref()))
            .cloned()
            .collect();
        categories.sort_by(|a, b| by_name(&a.name, &b.name).then(a.id.cmp(&b.id)));
        Ok(categories)
    }

    async fn get_categories(&self, ids: &[CategoryId]) -> Result<Vec<Category>> {
        let tables = self.inner.tables.read().await;
        Ok(tables
            .categories
            .values()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.inner.tables.read().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let tables = self.inner.tables.read().await;
        Ok(tables
            .products
            .values()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let tables = self.inner.tables.read().await;
        let needle = filter.search.as_deref().map(str::to_lowercase);

        let mut products: Vec<_> = tables
            .products
            .values()
            .filter(|p| !filter.active_only || p.is_active)
            .filter(|p| contains_ci(&p.name, needle.as_deref()))
            .filter(|p| filter.category_id.is_none_or(|id| p.category_id == id))
            .filter(|p| {
                filter.category_slug.as_deref().is_none_or(|slug| {
                    tables
                        .categories
                        .get(&p.category_id)
                        .is_some_and(|c| c.slug == slug)
                })
            })
            .filter(|p| filter.price_min.is_none_or(|min| p.price >= min))
            .filter(|p| filter.price_max.is_none_or(|max| p.price <= max))
            .cloned()
            .collect();
        products.sort_by(|a, b| by_name(&a.name, &b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.tables.read().await.orders.get(&id).cloned())
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let tables = self.inner.tables.read().await;
        Ok(tables
            .items
            .values()
            .filter(|i| i.order_id() == order_id)
            .cloned()
            .collect())
    }

    async fn orders_with_product(&self, product_id: ProductId) -> Result<Vec<Order>> {
        let tables = self.inner.tables.read().await;
        let ids: BTreeSet<OrderId> = tables
            .items
            .values()
            .filter(|i| i.product_id() == product_id)
            .map(OrderItem::order_id)
            .collect();
        Ok(ids
            .iter()
            .filter_map(|id| tables.orders.get(id).cloned())
            .collect())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderListing> {
        let tables = self.inner.tables.read().await;

        let mut orders: Vec<&Order> = tables
            .orders
            .values()
            .filter(|o| filter.user_id.is_none_or(|u| o.user_id() == u))
            .filter(|o| filter.status.is_none_or(|s| o.status() == s))
            .filter(|o| {
                filter
                    .date_from
                    .is_none_or(|from| o.created_at().date_naive() >= from)
            })
            .filter(|o| {
                filter
                    .date_to
                    .is_none_or(|to| o.created_at().date_naive() <= to)
            })
            .collect();
        orders.sort_by(|a, b| compare_orders(filter.sort, a, b));

        let total = orders.len() as u64;
        let orders = orders
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit)
            .map(|order| OrderRow {
                order: order.clone(),
                items_count: tables
                    .items
                    .values()
                    .filter(|i| i.order_id() == order.id())
                    .count() as u32,
            })
            .collect();

        Ok(OrderListing { total, orders })
    }
}

/// Uncommitted writes of one transaction. `None` marks a deleted row.
#[derive(Debug, Default)]
struct WriteSet {
    categories: BTreeMap<CategoryId, Option<Category>>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    items: BTreeMap<OrderItemId, Option<OrderItem>>,
}

impl WriteSet {
    fn apply_to(&self, tables: &mut Tables) {
        for (id, category) in &self.categories {
            match category {
                Some(category) => {
                    tables.categories.insert(*id, category.clone());
                }
                None => {
                    tables.categories.remove(id);
                }
            }
        }
        for (id, product) in &self.products {
            tables.products.insert(*id, product.clone());
        }
        for (id, order) in &self.orders {
            tables.orders.insert(*id, order.clone());
        }
        for (id, item) in &self.items {
            match item {
                Some(item) => {
                    tables.items.insert(*id, item.clone());
                }
                None => {
                    tables.items.remove(id);
                }
            }
        }
    }

    /// Checks the rows this transaction touched against the merged tables.
    fn check(&self, tables: &Tables) -> Result<()> {
        for (id, category) in &self.categories {
            match category {
                Some(category) => {
                    let others = tables.categories.values().filter(|c| c.id != *id);
                    for other in others {
                        if other.name == category.name {
                            return Err(StoreError::constraint(constraint::CATEGORY_NAME_UNIQUE));
                        }
                        if other.slug == category.slug {
                            return Err(StoreError::constraint(constraint::CATEGORY_SLUG_UNIQUE));
                        }
                    }
                }
                None => {
                    if tables.products.values().any(|p| p.category_id == *id) {
                        return Err(StoreError::constraint(constraint::PRODUCT_CATEGORY_FK));
                    }
                }
            }
        }

        for product in self.products.values() {
            if !tables.categories.contains_key(&product.category_id) {
                return Err(StoreError::constraint(constraint::PRODUCT_CATEGORY_FK));
            }
        }

        for order in self.orders.values() {
            if order.total_price().is_negative() {
                return Err(StoreError::constraint(constraint::ORDER_TOTAL_NON_NEGATIVE));
            }
        }

        for item in self.items.values().flatten() {
            if !tables.products.contains_key(&item.product_id()) {
                return Err(StoreError::constraint(constraint::ORDER_ITEM_PRODUCT_FK));
            }
            let duplicate = tables.items.values().any(|other| {
                other.id() != item.id()
                    && other.order_id() == item.order_id()
                    && other.product_id() == item.product_id()
            });
            if duplicate {
                return Err(StoreError::constraint(constraint::ORDER_ITEM_UNIQUE_PRODUCT));
            }
        }

        Ok(())
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTx {
    inner: Arc<Inner>,
    guards: HashMap<RowKey, OwnedMutexGuard<()>>,
    writes: WriteSet,
}

impl InMemoryTx {
    async fn lock(&mut self, key: RowKey) {
        if self.guards.contains_key(&key) {
            return;
        }
        let guard = self.inner.locks.handle(key).lock_owned().await;
        self.guards.insert(key, guard);
    }

    async fn category(&self, id: CategoryId) -> Option<Category> {
        match self.writes.categories.get(&id) {
            Some(staged) => staged.clone(),
            None => self.inner.tables.read().await.categories.get(&id).cloned(),
        }
    }

    async fn product(&self, id: ProductId) -> Option<Product> {
        match self.writes.products.get(&id) {
            Some(staged) => Some(staged.clone()),
            None => self.inner.tables.read().await.products.get(&id).cloned(),
        }
    }

    async fn order(&self, id: OrderId) -> Option<Order> {
        match self.writes.orders.get(&id) {
            Some(staged) => Some(staged.clone()),
            None => self.inner.tables.read().await.orders.get(&id).cloned(),
        }
    }

    async fn item(&self, id: OrderItemId) -> Option<OrderItem> {
        match self.writes.items.get(&id) {
            Some(staged) => staged.clone(),
            None => self.inner.tables.read().await.items.get(&id).cloned(),
        }
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn lock_category(&mut self, id: CategoryId) -> Result<Option<Category>> {
        self.lock(RowKey::Category(id)).await;
        Ok(self.category(id).await)
    }

    async fn insert_category(&mut self, category: NewCategory) -> Result<Category> {
        let now = Utc::now();
        let id = CategoryId::new(Sequences::next(&self.inner.sequences.category));
        let category = Category {
            id,
            name: category.name,
            slug: category.slug,
            is_active: category.is_active,
            created_at: now,
            updated_at: now,
        };
        self.writes.categories.insert(id, Some(category.clone()));
        Ok(category)
    }

    async fn update_category(&mut self, category: &Category) -> Result<Category> {
        if self.category(category.id).await.is_none() {
            return Err(StoreError::NotFound {
                entity: "category",
                id: category.id.get(),
            });
        }
        let mut updated = category.clone();
        updated.updated_at = Utc::now();
        self.writes
            .categories
            .insert(category.id, Some(updated.clone()));
        Ok(updated)
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<()> {
        if self.category(id).await.is_none() {
            return Err(StoreError::NotFound {
                entity: "category",
                id: id.get(),
            });
        }
        if self.count_products_in_category(id).await? > 0 {
            return Err(StoreError::constraint(constraint::PRODUCT_CATEGORY_FK));
        }
        self.writes.categories.insert(id, None);
        Ok(())
    }

    async fn count_products_in_category(&mut self, id: CategoryId) -> Result<u64> {
        let tables = self.inner.tables.read().await;
        let committed = tables
            .products
            .values()
            .filter(|p| !self.writes.products.contains_key(&p.id) && p.category_id == id)
            .count();
        let staged = self
            .writes
            .products
            .values()
            .filter(|p| p.category_id == id)
            .count();
        Ok((committed + staged) as u64)
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        self.lock(RowKey::Product(id)).await;
        Ok(self.product(id).await)
    }

    async fn lock_active_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut locked = Vec::with_capacity(ids.len());
        for id in ids {
            self.lock(RowKey::Product(id)).await;
            if let Some(product) = self.product(id).await
                && product.is_active
            {
                locked.push(product);
            }
        }
        Ok(locked)
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let now = Utc::now();
        let id = ProductId::new(Sequences::next(&self.inner.sequences.product));
        let product = Product {
            id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            category_id: product.category_id,
            is_active: product.is_active,
            created_at: now,
            updated_at: now,
        };
        self.writes.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(&mut self, product: &Product) -> Result<Product> {
        if self.product(product.id).await.is_none() {
            return Err(StoreError::NotFound {
                entity: "product",
                id: product.id.get(),
            });
        }
        let mut updated = product.clone();
        updated.updated_at = Utc::now();
        self.writes.products.insert(product.id, updated.clone());
        Ok(updated)
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> Result<u32> {
        let mut product = self.product(id).await.ok_or(StoreError::NotFound {
            entity: "product",
            id: id.get(),
        })?;

        let stock = u32::try_from(i64::from(product.stock) + delta)
            .map_err(|_| StoreError::constraint(constraint::PRODUCT_STOCK_NON_NEGATIVE))?;
        product.stock = stock;
        product.updated_at = Utc::now();
        self.writes.products.insert(id, product);
        Ok(stock)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.lock(RowKey::Order(id)).await;
        Ok(self.order(id).await)
    }

    async fn insert_order(&mut self, user_id: UserId) -> Result<Order> {
        let now = Utc::now();
        let id = OrderId::new(Sequences::next(&self.inner.sequences.order));
        let order = Order::from_parts(id, user_id, OrderStatus::Pending, Money::zero(), now, now);
        // New rows stay locked until commit.
        self.lock(RowKey::Order(id)).await;
        self.writes.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        if self.order(order.id()).await.is_none() {
            return Err(StoreError::NotFound {
                entity: "order",
                id: order.id().get(),
            });
        }
        self.writes.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let tables = self.inner.tables.read().await;
        let mut items: BTreeMap<OrderItemId, OrderItem> = tables
            .items
            .iter()
            .filter(|(_, item)| item.order_id() == order_id)
            .map(|(id, item)| (*id, item.clone()))
            .collect();
        for (id, staged) in &self.writes.items {
            match staged {
                Some(item) if item.order_id() == order_id => {
                    items.insert(*id, item.clone());
                }
                Some(_) => {}
                None => {
                    items.remove(id);
                }
            }
        }
        Ok(items.into_values().collect())
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>> {
        let now = Utc::now();
        let inserted: Vec<_> = items
            .iter()
            .map(|new| {
                OrderItem::from_parts(
                    OrderItemId::new(Sequences::next(&self.inner.sequences.item)),
                    order_id,
                    new.product_id,
                    new.quantity,
                    new.price_at_purchase,
                    now,
                )
            })
            .collect();
        for item in &inserted {
            self.writes.items.insert(item.id(), Some(item.clone()));
        }
        Ok(inserted)
    }

    async fn update_order_item(&mut self, item: &OrderItem) -> Result<()> {
        if self.item(item.id()).await.is_none() {
            return Err(StoreError::NotFound {
                entity: "order item",
                id: item.id().get(),
            });
        }
        self.writes.items.insert(item.id(), Some(item.clone()));
        Ok(())
    }

    async fn delete_order_item(&mut self, id: OrderItemId) -> Result<()> {
        if self.item(id).await.is_none() {
            return Err(StoreError::NotFound {
                entity: "order item",
                id: id.get(),
            });
        }
        self.writes.items.insert(id, None);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        if self.inner.fail_on_commit.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Commit("injected commit failure".into()));
        }

        let mut tables = self.inner.tables.write().await;
        let mut next = tables.clone();
        self.writes.apply_to(&mut next);
        self.writes.check(&next)?;
        *tables = next;
        drop(tables);

        // Row locks are released when `self.guards` drops here.
        Ok(())
    }
}

fn contains_ci(haystack: &str, needle: Option<&str>) -> bool {
    needle.is_none_or(|needle| haystack.to_lowercase().contains(needle))
}

fn by_name(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn compare_orders(sort: OrderSort, a: &Order, b: &Order) -> Ordering {
    let primary = match sort.field {
        OrderSortField::CreatedAt => a.created_at().cmp(&b.created_at()),
        OrderSortField::TotalPrice => a.total_price().cmp(&b.total_price()),
        OrderSortField::Status => a.status().as_str().cmp(b.status().as_str()),
        OrderSortField::UserId => a.user_id().cmp(&b.user_id()),
    };
    let ordering = primary.then(a.id().cmp(&b.id()));
    if sort.descending {
        ordering.reverse()
    } else {
        ordering
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn seed(store: &InMemoryStore, stock: u32) -> (CategoryId, ProductId) {
        let mut tx = store.begin().await.unwrap();
        let category = tx
            .insert_category(NewCategory::new("Books", None).unwrap())
            .await
            .unwrap();
        let product = tx
            .insert_product(NewProduct {
                name: "Rust Book".into(),
                description: String::new(),
                price: Money::from_major(40),
                stock,
                category_id: category.id,
                is_active: true,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (category.id, product.id)
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let store = InMemoryStore::new();
        let (_, product) = seed(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_product(product).await.unwrap();
        assert_eq!(tx.adjust_stock(product, -2).await.unwrap(), 3);

        assert_eq!(store.get_product(product).await.unwrap().unwrap().stock, 5);
        drop(tx);
        assert_eq!(store.get_product(product).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_commit_applies_writes() {
        let store = InMemoryStore::new();
        let (_, product) = seed(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        tx.lock_product(product).await.unwrap();
        tx.adjust_stock(product, -5).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.get_product(product).await.unwrap().unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_negative_stock_rejected() {
        let store = InMemoryStore::new();
        let (_, product) = seed(&store, 1).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.adjust_stock(product, -2).await.unwrap_err();
        assert_eq!(
            err.constraint_name(),
            Some(constraint::PRODUCT_STOCK_NON_NEGATIVE)
        );
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_transaction() {
        let store = InMemoryStore::new();
        let (_, product) = seed(&store, 5).await;

        let mut first = store.begin().await.unwrap();
        first.lock_product(product).await.unwrap();

        let contender = store.clone();
        let handle = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            second.lock_product(product).await.unwrap().unwrap().stock
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        first.adjust_stock(product, -4).await.unwrap();
        first.commit().await.unwrap();

        // The waiter sees the committed value once the lock is released.
        assert_eq!(handle.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_category_name_rejected_at_commit() {
        let store = InMemoryStore::new();
        seed(&store, 1).await;

        let mut tx = store.begin().await.unwrap();
        tx.insert_category(NewCategory::new("Books", Some("other")).unwrap())
            .await
            .unwrap();
        let err = tx.commit().await.unwrap_err();

        assert_eq!(err.constraint_name(), Some(constraint::CATEGORY_NAME_UNIQUE));
        assert_eq!(
            store
                .list_categories(&CategoryFilter::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_category_in_use_rejected() {
        let store = InMemoryStore::new();
        let (category, _) = seed(&store, 1).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.delete_category(category).await.unwrap_err();
        assert_eq!(err.constraint_name(), Some(constraint::PRODUCT_CATEGORY_FK));
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_tables() {
        let store = InMemoryStore::new();
        store.set_fail_on_commit(true);

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(UserId::new(1)).await.unwrap();
        assert!(matches!(tx.commit().await, Err(StoreError::Commit(_))));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_list_orders_paginates_and_counts_items() {
        let store = InMemoryStore::new();
        let (_, product) = seed(&store, 100).await;

        for user in [1, 1, 2] {
            let mut tx = store.begin().await.unwrap();
            let order = tx.insert_order(UserId::new(user)).await.unwrap();
            tx.insert_order_items(
                order.id(),
                &[NewOrderItem::new(product, 1, Money::from_major(40)).unwrap()],
            )
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }

        let listing = store
            .list_orders(&OrderFilter {
                user_id: Some(UserId::new(1)),
                limit: 1,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(listing.total, 2);
        assert_eq!(listing.orders.len(), 1);
        assert_eq!(listing.orders[0].items_count, 1);
        // Newest first, ties broken by id.
        assert_eq!(listing.orders[0].order.id(), OrderId::new(2));
    }

    #[tokio::test]
    async fn test_orders_with_product() {
        let store = InMemoryStore::new();
        let (_, product) = seed(&store, 100).await;

        let mut ids = Vec::new();
        for user in [1, 2] {
            let mut tx = store.begin().await.unwrap();
            let order = tx.insert_order(UserId::new(user)).await.unwrap();
            tx.insert_order_items(
                order.id(),
                &[NewOrderItem::new(product, 1, Money::from_major(40)).unwrap()],
            )
            .await
            .unwrap();
            tx.commit().await.unwrap();
            ids.push(order.id());
        }
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(UserId::new(3)).await.unwrap();
        tx.commit().await.unwrap();

        let orders = store.orders_with_product(product).await.unwrap();

        assert_eq!(orders.iter().map(|o| o.id()).collect::<Vec<_>>(), ids);
        assert_eq!(orders[1].user_id(), UserId::new(2));
    }

    #[tokio::test]
    async fn test_product_filters() {
        let store = InMemoryStore::new();
        let (category, _) = seed(&store, 1).await;

        let mut tx = store.begin().await.unwrap();
        let mut hidden = tx
            .insert_product(NewProduct {
                name: "Another Rust Title".into(),
                description: String::new(),
                price: Money::from_major(5),
                stock: 1,
                category_id: category,
                is_active: true,
            })
            .await
            .unwrap();
        hidden.deactivate();
        tx.update_product(&hidden).await.unwrap();
        tx.commit().await.unwrap();

        let active = store
            .list_products(&ProductFilter {
                active_only: true,
                search: Some("rust".into()),
                category_slug: Some("books".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Rust Book");

        let cheap = store
            .list_products(&ProductFilter {
                price_max: Some(Money::from_major(10)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cheap.len(), 1);
        assert!(!cheap[0].is_active);
    }
}
