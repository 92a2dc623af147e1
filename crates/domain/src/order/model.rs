use chrono::{DateTime, Utc};
use common::{OrderId, OrderItemId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderStatus};
use crate::Money;

/// Order header.
///
/// Status and total only change through [`Order::transition_to`] and
/// [`Order::set_total`], which enforce the lifecycle and the non-negative
/// total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    total_price: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Outcome of a status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed { from: OrderStatus, to: OrderStatus },
    /// The order already had the requested status.
    Unchanged,
}

impl Order {
    /// Rebuilds an order from persisted columns.
    pub fn from_parts(
        id: OrderId,
        user_id: UserId,
        status: OrderStatus,
        total_price: Money,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            status,
            total_price,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_price(&self) -> Money {
        self.total_price
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_read_only(&self) -> bool {
        self.status.is_read_only()
    }

    /// Moves the order to `target`.
    ///
    /// Requesting the current status is accepted and reported as
    /// [`Transition::Unchanged`].
    pub fn transition_to(&mut self, target: OrderStatus) -> Result<Transition, OrderError> {
        if self.status == target {
            return Ok(Transition::Unchanged);
        }
        if !self.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        let from = std::mem::replace(&mut self.status, target);
        self.updated_at = Utc::now();
        Ok(Transition::Changed { from, to: target })
    }

    /// Largest total an order may carry (`NUMERIC(12, 2)`).
    pub fn max_total() -> Money {
        Money::from_cents(999_999_999_999)
    }

    pub fn set_total(&mut self, total: Money) -> Result<(), OrderError> {
        if total.is_negative() {
            return Err(OrderError::NegativeTotal { total });
        }
        if total > Self::max_total() {
            return Err(OrderError::TotalOverflow {
                max: Self::max_total(),
            });
        }
        self.total_price = total;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Recomputes the total from the given line items.
    pub fn recalc_total(&mut self, items: &[OrderItem]) -> Result<Money, OrderError> {
        let total = Self::total_of(items)?;
        self.set_total(total)?;
        Ok(total)
    }

    /// Sum of quantity times purchase price.
    pub fn total_of(items: &[OrderItem]) -> Result<Money, OrderError> {
        items.iter().try_fold(Money::zero(), |total, item| {
            total
                .checked_add(item.line_total()?)
                .ok_or(OrderError::TotalOverflow {
                    max: Self::max_total(),
                })
        })
    }

    /// Fails if line items may no longer be added, changed or removed.
    pub fn ensure_items_mutable(&self) -> Result<(), OrderError> {
        if self.is_read_only() {
            return Err(OrderError::ReadOnly {
                status: self.status,
            });
        }
        Ok(())
    }
}

/// A persisted order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    id: OrderItemId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: u32,
    price_at_purchase: Money,
    created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn from_parts(
        id: OrderItemId,
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
        price_at_purchase: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            product_id,
            quantity,
            price_at_purchase,
            created_at,
        }
    }

    pub fn id(&self) -> OrderItemId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn price_at_purchase(&self) -> Money {
        self.price_at_purchase
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn line_total(&self) -> Result<Money, OrderError> {
        self.price_at_purchase
            .checked_multiply(self.quantity)
            .ok_or(OrderError::TotalOverflow {
                max: Order::max_total(),
            })
    }

    /// Applies an update and returns the change in quantity.
    ///
    /// Product and purchase price may be echoed back unchanged but never
    /// modified.
    pub fn apply(&mut self, update: OrderItemUpdate) -> Result<i64, OrderError> {
        if update.product_id.is_some_and(|p| p != self.product_id) {
            return Err(OrderError::ImmutableField {
                field: "product_id",
            });
        }
        if update
            .price_at_purchase
            .is_some_and(|p| p != self.price_at_purchase)
        {
            return Err(OrderError::ImmutableField {
                field: "price_at_purchase",
            });
        }

        let Some(quantity) = update.quantity else {
            return Ok(0);
        };
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: self.product_id,
                quantity,
            });
        }

        let delta = i64::from(quantity) - i64::from(self.quantity);
        self.quantity = quantity;
        Ok(delta)
    }

    /// Increases the quantity of an existing line.
    pub fn add_quantity(&mut self, quantity: u32) -> Result<(), OrderError> {
        self.quantity = self
            .quantity
            .checked_add(quantity)
            .ok_or(OrderError::QuantityOverflow {
                product_id: self.product_id,
            })?;
        Ok(())
    }
}

/// A line to be inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price_at_purchase: Money,
}

impl NewOrderItem {
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        price_at_purchase: Money,
    ) -> Result<Self, OrderError> {
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id,
                quantity,
            });
        }
        if price_at_purchase.is_negative() {
            return Err(OrderError::NegativePrice {
                price: price_at_purchase,
            });
        }
        Ok(Self {
            product_id,
            quantity,
            price_at_purchase,
        })
    }
}

/// Requested change to an order line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderItemUpdate {
    pub product_id: Option<ProductId>,
    pub price_at_purchase: Option<Money>,
    pub quantity: Option<u32>,
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}
