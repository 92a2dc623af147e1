//! Validation and aggregation of a reservation request.

use std::collections::BTreeMap;

use common::ProductId;
use serde::{Deserialize, Serialize};

use super::OrderError;
use crate::catalog::Product;

/// A line as submitted by the caller. Product ids may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A validated reservation: one entry per distinct product, ascending by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    lines: BTreeMap<ProductId, u32>,
}

/// One product whose stock cannot cover the requested quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub product_id: ProductId,
    pub available: u32,
    pub requested: u32,
}

impl ReservationRequest {
    /// Validates and aggregates the submitted lines.
    ///
    /// Duplicate product ids are merged by summing their quantities.
    pub fn new(lines: impl IntoIterator<Item = RequestedLine>) -> Result<Self, OrderError> {
        let mut merged = BTreeMap::new();

        for line in lines {
            if line.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: line.product_id,
                    quantity: line.quantity,
                });
            }
            let entry = merged.entry(line.product_id).or_insert(0u32);
            *entry = entry
                .checked_add(line.quantity)
                .ok_or(OrderError::QuantityOverflow {
                    product_id: line.product_id,
                })?;
        }

        if merged.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        Ok(Self { lines: merged })
    }

    /// Distinct product ids in ascending order, the order row locks are taken in.
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.keys().copied().collect()
    }

    /// Aggregated `(product, quantity)` pairs in ascending product order.
    pub fn lines(&self) -> impl Iterator<Item = (ProductId, u32)> + '_ {
        self.lines.iter().map(|(id, qty)| (*id, *qty))
    }

    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.lines.get(&product_id).copied()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Requested ids with no matching row in `locked`.
    pub fn missing_from(&self, locked: &[Product]) -> Vec<ProductId> {
        self.lines
            .keys()
            .filter(|id| !locked.iter().any(|p| p.id == **id))
            .copied()
            .collect()
    }

    /// Every line whose product stock is below the requested quantity.
    pub fn shortfalls(&self, locked: &[Product]) -> Vec<Shortfall> {
        locked
            .iter()
            .filter_map(|product| {
                let requested = self.quantity_of(product.id)?;
                (product.stock < requested).then_some(Shortfall {
                    product_id: product.id,
                    available: product.stock,
                    requested,
                })
            })
            .collect()
    }
}
