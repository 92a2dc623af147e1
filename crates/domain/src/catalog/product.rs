use chrono::{DateTime, Utc};
use common::{CategoryId, ProductId};
use serde::{Deserialize, Serialize};

use super::{CatalogError, MAX_PRICE_CENTS};
use crate::Money;

/// A sellable product with its on-hand stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: u32,
    pub category_id: CategoryId,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub stock: u32,
    pub category_id: CategoryId,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewProduct {
    /// Trims the name and rejects prices outside `0..=max_price()`.
    pub fn validate(mut self) -> Result<Self, CatalogError> {
        self.name = validate_name(&self.name)?;
        validate_price(self.price)?;
        Ok(self)
    }
}

/// Partial update of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<u32>,
    pub category_id: Option<CategoryId>,
    pub is_active: Option<bool>,
}

impl Product {
    pub fn apply(&mut self, update: ProductUpdate) -> Result<(), CatalogError> {
        if let Some(name) = update.name {
            self.name = validate_name(&name)?;
        }
        if let Some(price) = update.price {
            validate_price(price)?;
            self.price = price;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(stock) = update.stock {
            self.stock = stock;
        }
        if let Some(category_id) = update.category_id {
            self.category_id = category_id;
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        Ok(())
    }

    /// Returns false if the product was already inactive.
    pub fn deactivate(&mut self) -> bool {
        std::mem::replace(&mut self.is_active, false)
    }
}

fn validate_name(name: &str) -> Result<String, CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::EmptyName);
    }
    Ok(name.to_string())
}

/// Largest price a product may carry.
pub fn max_price() -> Money {
    Money::from_cents(MAX_PRICE_CENTS)
}

fn validate_price(price: Money) -> Result<(), CatalogError> {
    if price.is_negative() {
        return Err(CatalogError::NegativePrice { price });
    }
    if price > max_price() {
        return Err(CatalogError::PriceTooHigh {
            price,
            max: max_price(),
        });
    }
    Ok(())
}
