use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, OrderId, OrderItemId, ProductId, UserId};
use domain::{
    Category, Money, NewCategory, NewOrderItem, NewProduct, Order, OrderItem, OrderStatus, Product,
};
use rust_decimal::Decimal;
use sqlx::{
    PgPool, Postgres, QueryBuilder, Row, Transaction,
    postgres::{PgPoolOptions, PgRow},
};

use crate::{
    CategoryFilter, OrderFilter, OrderListing, OrderRow, ProductFilter, Result, StoreError,
    store::{Store, StoreTx},
};

const CATEGORY_COLUMNS: &str = "id, name, slug, is_active, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock, category_id, is_active, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, status, total_price, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price_at_purchase, created_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_category(row: PgRow) -> Result<Category> {
    Ok(Category {
        id: CategoryId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::new(row.try_get::<Decimal, _>("price")?),
        stock: to_u32("products", row.try_get("stock")?)?,
        category_id: CategoryId::new(row.try_get("category_id")?),
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::CorruptRow {
            table: "orders",
            message: e.to_string(),
        })?;

    Ok(Order::from_parts(
        OrderId::new(row.try_get("id")?),
        UserId::new(row.try_get("user_id")?),
        status,
        Money::new(row.try_get::<Decimal, _>("total_price")?),
        row.try_get::<DateTime<Utc>, _>("created_at")?,
        row.try_get::<DateTime<Utc>, _>("updated_at")?,
    ))
}

fn row_to_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem::from_parts(
        OrderItemId::new(row.try_get("id")?),
        OrderId::new(row.try_get("order_id")?),
        ProductId::new(row.try_get("product_id")?),
        to_u32("order_items", row.try_get("quantity")?)?,
        Money::new(row.try_get::<Decimal, _>("price_at_purchase")?),
        row.try_get::<DateTime<Utc>, _>("created_at")?,
    ))
}

fn to_u32(table: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::CorruptRow {
        table,
        message: format!("{value} is out of range"),
    })
}

/// Maps constraint violations to [`StoreError::Constraint`].
fn map_db_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && let Some(constraint) = db_err.constraint()
    {
        return StoreError::constraint(constraint);
    }
    StoreError::Database(e)
}

fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn ids<T: Copy + Into<i64>>(ids: &[T]) -> Vec<i64> {
    ids.iter().map(|id| (*id).into()).collect()
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx> {
        Ok(PgTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_category).transpose()
    }

    async fn list_categories(&self, filter: &CategoryFilter) -> Result<Vec<Category>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE TRUE"
        ));
        if filter.active_only {
            qb.push(" AND is_active");
        }
        if let Some(search) = &filter.search {
            qb.push(" AND name ILIKE ").push_bind(like_pattern(search));
        }
        qb.push(" ORDER BY LOWER(name) ASC, id ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_category).collect()
    }

    async fn get_categories(&self, category_ids: &[CategoryId]) -> Result<Vec<Category>> {
        let rows = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids(category_ids))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_category).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn get_products(&self, product_ids: &[ProductId]) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id"
        ))
        .bind(ids(product_ids))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT p.id, p.name, p.description, p.price, p.stock, p.category_id, \
             p.is_active, p.created_at, p.updated_at \
             FROM products p JOIN categories c ON c.id = p.category_id WHERE TRUE",
        );
        if filter.active_only {
            qb.push(" AND p.is_active");
        }
        if let Some(search) = &filter.search {
            qb.push(" AND p.name ILIKE ").push_bind(like_pattern(search));
        }
        if let Some(category_id) = filter.category_id {
            qb.push(" AND p.category_id = ").push_bind(category_id.get());
        }
        if let Some(slug) = &filter.category_slug {
            qb.push(" AND c.slug = ").push_bind(slug.clone());
        }
        if let Some(min) = filter.price_min {
            qb.push(" AND p.price >= ").push_bind(min.amount());
        }
        if let Some(max) = filter.price_max {
            qb.push(" AND p.price <= ").push_bind(max.amount());
        }
        qb.push(" ORDER BY LOWER(p.name) ASC, p.id ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_product).collect()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_order).transpose()
    }

    async fn get_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_item).collect()
    }

    async fn orders_with_product(&self, product_id: ProductId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE id IN (SELECT order_id FROM order_items WHERE product_id = $1) \
             ORDER BY id"
        ))
        .bind(product_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_order).collect()
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<OrderListing> {
        fn push_conditions(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
            if let Some(user_id) = filter.user_id {
                qb.push(" AND o.user_id = ").push_bind(user_id.get());
            }
            if let Some(status) = filter.status {
                qb.push(" AND o.status = ").push_bind(status.as_str());
            }
            if let Some(from) = filter.date_from {
                qb.push(" AND (o.created_at AT TIME ZONE 'UTC')::date >= ")
                    .push_bind(from);
            }
            if let Some(to) = filter.date_to {
                qb.push(" AND (o.created_at AT TIME ZONE 'UTC')::date <= ")
                    .push_bind(to);
            }
        }

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o WHERE TRUE");
        push_conditions(&mut count, filter);
        let total = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let direction = if filter.sort.descending { "DESC" } else { "ASC" };
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT o.id, o.user_id, o.status, o.total_price, o.created_at, o.updated_at, \
             (SELECT COUNT(*) FROM order_items i WHERE i.order_id = o.id) AS items_count \
             FROM orders o WHERE TRUE",
        );
        push_conditions(&mut qb, filter);
        qb.push(format!(
            " ORDER BY o.{} {direction}, o.id {direction}",
            filter.sort.field.column()
        ));
        // out-of-range values saturate so a huge page reads as past the end
        qb.push(" LIMIT ")
            .push_bind(i64::try_from(filter.limit).unwrap_or(i64::MAX));
        qb.push(" OFFSET ")
            .push_bind(i64::try_from(filter.offset).unwrap_or(i64::MAX));

        let rows = qb.build().fetch_all(&self.pool).await?;
        let orders = rows
            .into_iter()
            .map(|row| {
                let items_count = to_u32("order_items", row.try_get("items_count")?)?;
                Ok(OrderRow {
                    order: row_to_order(row)?,
                    items_count,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OrderListing {
            total: total.max(0) as u64,
            orders,
        })
    }
}

/// Transaction over a [`PostgresStore`]. Rolled back on drop.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_category(&mut self, id: CategoryId) -> Result<Option<Category>> {
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_category).transpose()
    }

    async fn insert_category(&mut self, category: NewCategory) -> Result<Category> {
        let row = sqlx::query(&format!(
            "INSERT INTO categories (name, slug, is_active) VALUES ($1, $2, $3) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.is_active)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row_to_category(row)
    }

    async fn update_category(&mut self, category: &Category) -> Result<Category> {
        let row = sqlx::query(&format!(
            "UPDATE categories SET name = $2, slug = $3, is_active = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(category.id.get())
        .bind(&category.name)
        .bind(&category.slug)
        .bind(category.is_active)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row.map(row_to_category)
            .transpose()?
            .ok_or(StoreError::NotFound {
                entity: "category",
                id: category.id.get(),
            })
    }

    async fn delete_category(&mut self, id: CategoryId) -> Result<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "category",
                id: id.get(),
            });
        }
        Ok(())
    }

    async fn count_products_in_category(&mut self, id: CategoryId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE category_id = $1")
            .bind(id.get())
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_product).transpose()
    }

    async fn lock_active_products(&mut self, product_ids: &[ProductId]) -> Result<Vec<Product>> {
        // Rows are locked in result order, hence ORDER BY id.
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE id = ANY($1) AND is_active ORDER BY id FOR UPDATE"
        ))
        .bind(ids(product_ids))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_product).collect()
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            "INSERT INTO products (name, description, price, stock, category_id, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(i64::from(product.stock))
        .bind(product.category_id.get())
        .bind(product.is_active)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row_to_product(row)
    }

    async fn update_product(&mut self, product: &Product) -> Result<Product> {
        let row = sqlx::query(&format!(
            "UPDATE products SET name = $2, description = $3, price = $4, stock = $5, \
             category_id = $6, is_active = $7, updated_at = NOW() \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.id.get())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(i64::from(product.stock))
        .bind(product.category_id.get())
        .bind(product.is_active)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row.map(row_to_product)
            .transpose()?
            .ok_or(StoreError::NotFound {
                entity: "product",
                id: product.id.get(),
            })
    }

    async fn adjust_stock(&mut self, id: ProductId, delta: i64) -> Result<u32> {
        let stock: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET stock = stock + $2, updated_at = NOW() \
             WHERE id = $1 RETURNING stock",
        )
        .bind(id.get())
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        let stock = stock.ok_or(StoreError::NotFound {
            entity: "product",
            id: id.get(),
        })?;
        to_u32("products", stock)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_order).transpose()
    }

    async fn insert_order(&mut self, user_id: UserId) -> Result<Order> {
        let row = sqlx::query(&format!(
            "INSERT INTO orders (user_id, status, total_price) VALUES ($1, $2, 0) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(user_id.get())
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        row_to_order(row)
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, total_price = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(order.id().get())
        .bind(order.status().as_str())
        .bind(order.total_price().amount())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order",
                id: order.id().get(),
            });
        }
        Ok(())
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
        ))
        .bind(order_id.get())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_item).collect()
    }

    async fn insert_order_items(
        &mut self,
        order_id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO order_items (order_id, product_id, quantity, price_at_purchase) ",
        );
        qb.push_values(items, |mut row, item| {
            row.push_bind(order_id.get())
                .push_bind(item.product_id.get())
                .push_bind(i64::from(item.quantity))
                .push_bind(item.price_at_purchase.amount());
        });
        qb.push(format!(" RETURNING {ITEM_COLUMNS}"));

        let rows = qb
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_db_error)?;
        let mut inserted = rows
            .into_iter()
            .map(row_to_item)
            .collect::<Result<Vec<_>>>()?;
        inserted.sort_by_key(OrderItem::id);
        Ok(inserted)
    }

    async fn update_order_item(&mut self, item: &OrderItem) -> Result<()> {
        let result = sqlx::query("UPDATE order_items SET quantity = $2 WHERE id = $1")
            .bind(item.id().get())
            .bind(i64::from(item.quantity()))
            .execute(&mut *self.tx)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order item",
                id: item.id().get(),
            });
        }
        Ok(())
    }

    async fn delete_order_item(&mut self, id: OrderItemId) -> Result<()> {
        let result = sqlx::query("DELETE FROM order_items WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order item",
                id: id.get(),
            });
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(map_db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("tea"), "%tea%");
    }
}
