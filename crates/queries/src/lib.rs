//! Read side of the online store.
//!
//! - [`CatalogQueries`]: category and product lists and details
//! - [`OrderQueries`]: customer and staff order lists, order details
//! - [`params`]: permissive query-string parsing
//! - [`views`]: the cached response shapes
//!
//! Every read goes through the cache facade and falls back to the store.

pub mod catalog;
pub mod error;
pub mod orders;
pub mod params;
pub mod views;

pub use catalog::CatalogQueries;
pub use error::{QueryError, Result};
pub use orders::OrderQueries;
pub use views::{
    CategoryInline, CategorySummary, CategoryView, OrderItemView, OrderPage, OrderSummary,
    OrderView, ProductSummary, ProductView,
};
