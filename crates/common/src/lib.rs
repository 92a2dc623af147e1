//! Shared types used across the online store crates.

pub mod identity;
pub mod ids;

pub use identity::Identity;
pub use ids::{CategoryId, OrderId, OrderItemId, ProductId, UserId};
