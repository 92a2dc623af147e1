//! Domain layer for the online store.
//!
//! Provides:
//! - Catalog records (categories, products) with their validation rules
//! - Orders and line items with the status state machine
//! - Reservation request validation and aggregation
//! - `Money`, a two-digit decimal amount

pub mod catalog;
pub mod money;
pub mod order;

pub use catalog::{
    CatalogError, Category, CategoryUpdate, NewCategory, NewProduct, Product, ProductUpdate, max_price,
    slugify,
};
pub use money::Money;
pub use order::{
    NewOrderItem, Order, OrderError, OrderItem, OrderItemUpdate, OrderStatus, OrderWithItems,
    RequestedLine, ReservationRequest, Shortfall, Transition,
};
