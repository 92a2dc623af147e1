//! Catalog records read and written by the order engine.

mod category;
mod product;

pub use category::{Category, CategoryUpdate, NewCategory, slugify};
pub use product::{NewProduct, Product, ProductUpdate, max_price};

use thiserror::Error;

use crate::Money;

/// Maximum length of a category slug.
pub const SLUG_MAX_LEN: usize = 100;

/// Largest product price in cents (`NUMERIC(10, 2)`).
pub const MAX_PRICE_CENTS: i64 = 9_999_999_999;

/// Errors raised while validating catalog records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Name must not be empty")]
    EmptyName,

    #[error("Slug must not be empty after normalization")]
    EmptySlug,

    #[error("Invalid price: {price} (must not be negative)")]
    NegativePrice { price: Money },

    #[error("Invalid price: {price} (must not exceed {max})")]
    PriceTooHigh { price: Money, max: Money },
}
