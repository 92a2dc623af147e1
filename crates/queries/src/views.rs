//! Response shapes of the read endpoints.
//!
//! These are what gets cached, so every view round-trips through JSON.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{CategoryId, OrderId, OrderItemId, ProductId, UserId};
use domain::{Category, Money, Order, OrderItem, OrderStatus, Product};
use serde::{Deserialize, Serialize};
use store::OrderRow;

/// A row of the category list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Category> for CategorySummary {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryView {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
            slug: category.slug.clone(),
            is_active: category.is_active,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

/// A row of the product list. `category` is the category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub category: String,
}

impl ProductSummary {
    pub fn new(product: &Product, category_name: &str) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
            category: category_name.to_string(),
        }
    }
}

/// The category embedded in a product detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInline {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub category: CategoryInline,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductView {
    pub fn new(product: &Product, category: &Category) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            stock: product.stock,
            category: CategoryInline {
                id: category.id,
                name: category.name.clone(),
                slug: category.slug.clone(),
            },
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// A row of an order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items_count: u32,
}

impl From<&OrderRow> for OrderSummary {
    fn from(row: &OrderRow) -> Self {
        Self {
            id: row.order.id(),
            status: row.order.status(),
            total_price: row.order.total_price(),
            created_at: row.order.created_at(),
            updated_at: row.order.updated_at(),
            items_count: row.items_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub id: OrderItemId,
    pub product: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price_at_purchase: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub user: UserId,
    pub status: OrderStatus,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

impl OrderView {
    /// Builds the detail view. Lines whose product has since been removed
    /// show `Product #{id}`.
    pub fn new(
        order: &Order,
        items: &[OrderItem],
        product_names: &HashMap<ProductId, String>,
    ) -> Self {
        let items = items
            .iter()
            .map(|item| OrderItemView {
                id: item.id(),
                product: item.product_id(),
                product_name: product_names
                    .get(&item.product_id())
                    .cloned()
                    .unwrap_or_else(|| format!("Product #{}", item.product_id())),
                quantity: item.quantity(),
                price_at_purchase: item.price_at_purchase(),
                created_at: item.created_at(),
            })
            .collect();

        Self {
            id: order.id(),
            user: order.user_id(),
            status: order.status(),
            total_price: order.total_price(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            items,
        }
    }
}

/// One page of an order list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPage {
    /// Number of matching orders across all pages.
    pub count: u64,
    pub page: usize,
    pub page_size: usize,
    pub results: Vec<OrderSummary>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn order_view_json_shape() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let order = Order::from_parts(
            OrderId::new(3),
            UserId::new(8),
            OrderStatus::Processing,
            Money::from_cents(106000),
            at,
            at,
        );
        let items = [
            OrderItem::from_parts(
                OrderItemId::new(1),
                order.id(),
                ProductId::new(10),
                2,
                Money::from_major(500),
                at,
            ),
            OrderItem::from_parts(
                OrderItemId::new(2),
                order.id(),
                ProductId::new(11),
                3,
                Money::from_major(20),
                at,
            ),
        ];
        let names = HashMap::from([(ProductId::new(10), "Laptop".to_string())]);

        let json = serde_json::to_value(OrderView::new(&order, &items, &names)).unwrap();

        assert_eq!(json["user"], 8);
        assert_eq!(json["status"], "processing");
        assert_eq!(json["total_price"], "1060.00");
        assert_eq!(json["items"][0]["product"], 10);
        assert_eq!(json["items"][0]["product_name"], "Laptop");
        assert_eq!(json["items"][0]["price_at_purchase"], "500.00");
        assert_eq!(json["items"][1]["product_name"], "Product #11");
    }
}
