//! List filters shared by the store implementations.

use chrono::NaiveDate;
use common::{CategoryId, UserId};
use domain::{Money, OrderStatus};

/// Filter for category listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    /// Only active categories.
    pub active_only: bool,
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
}

/// Filter for product listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub active_only: bool,
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub category_slug: Option<String>,
    pub price_min: Option<Money>,
    pub price_max: Option<Money>,
}

/// Sortable order columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderSortField {
    #[default]
    CreatedAt,
    TotalPrice,
    Status,
    UserId,
}

impl OrderSortField {
    pub fn column(&self) -> &'static str {
        match self {
            OrderSortField::CreatedAt => "created_at",
            OrderSortField::TotalPrice => "total_price",
            OrderSortField::Status => "status",
            OrderSortField::UserId => "user_id",
        }
    }
}

/// Sort order for order listings. Ties break on id in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSort {
    pub field: OrderSortField,
    pub descending: bool,
}

impl Default for OrderSort {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: OrderSortField::CreatedAt,
            descending: true,
        }
    }
}

/// Filter for order listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on the creation date (UTC).
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on the creation date (UTC).
    pub date_to: Option<NaiveDate>,
    pub sort: OrderSort,
    pub limit: usize,
    pub offset: usize,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            user_id: None,
            status: None,
            date_from: None,
            date_to: None,
            sort: OrderSort::default(),
            limit: 20,
            offset: 0,
        }
    }
}

/// One page of orders plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderListing {
    pub total: u64,
    pub orders: Vec<OrderRow>,
}

/// An order header with its line count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRow {
    pub order: domain::Order,
    pub items_count: u32,
}
