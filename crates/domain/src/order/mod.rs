//! Orders, line items and the reservation request.

mod model;
mod reservation;
mod status;

pub use model::{NewOrderItem, Order, OrderItem, OrderItemUpdate, OrderWithItems, Transition};
pub use reservation::{RequestedLine, ReservationRequest, Shortfall};
pub use status::OrderStatus;

use common::ProductId;
use thiserror::Error;

use crate::Money;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// A reservation must reserve something.
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// Invalid quantity.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Quantities for one product overflowed when aggregated.
    #[error("Quantity for product {product_id} is too large")]
    QuantityOverflow { product_id: ProductId },

    /// Invalid price.
    #[error("Invalid price: {price} (must not be negative)")]
    NegativePrice { price: Money },

    /// The target status is not reachable from the current one.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Totals are never negative.
    #[error("Invalid total: {total} (must not be negative)")]
    NegativeTotal { total: Money },

    #[error("Order total exceeds {max}")]
    TotalOverflow { max: Money },

    /// Shipped, delivered and cancelled orders cannot change.
    #[error("Order is {status} and can no longer be modified")]
    ReadOnly { status: OrderStatus },

    /// Product and purchase price are fixed once a line exists.
    #[error("Field '{field}' cannot be changed after the item is created")]
    ImmutableField { field: &'static str },

    /// Unrecognized status name.
    #[error("Unknown order status: {value}")]
    UnknownStatus { value: String },
}
