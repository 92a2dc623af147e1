//! Fulfillment error types.

use common::{CategoryId, ProductId};
use domain::{CatalogError, OrderError, Shortfall};
use store::{StoreError, constraint};
use thiserror::Error;

/// Errors that can occur while mutating orders and the catalog.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// An order rule was violated.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// A catalog rule was violated.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Requested products do not exist or are inactive.
    #[error("Products unavailable: {product_ids:?}")]
    ProductsUnavailable { product_ids: Vec<ProductId> },

    /// Stock cannot cover one or more lines.
    #[error("Insufficient stock for {} product(s)", shortfalls.len())]
    InsufficientStock { shortfalls: Vec<Shortfall> },

    /// The target row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// The caller may not act on this resource.
    #[error("Permission denied")]
    PermissionDenied,

    /// Products still reference the category.
    #[error("Category {id} is referenced by {products} product(s)")]
    CategoryInUse { id: CategoryId, products: u64 },

    /// A uniqueness rule rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl FulfillmentError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        FulfillmentError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Short reason label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            FulfillmentError::Order(_) | FulfillmentError::Catalog(_) => "validation",
            FulfillmentError::Store(_) => "store",
            FulfillmentError::ProductsUnavailable { .. } => "products_unavailable",
            FulfillmentError::InsufficientStock { .. } => "insufficient_stock",
            FulfillmentError::NotFound { .. } => "not_found",
            FulfillmentError::PermissionDenied => "permission_denied",
            FulfillmentError::CategoryInUse { .. } => "category_in_use",
            FulfillmentError::Conflict(_) => "conflict",
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err.constraint_name() {
            Some(constraint::CATEGORY_NAME_UNIQUE) => {
                FulfillmentError::Conflict("A category with this name already exists".into())
            }
            Some(constraint::CATEGORY_SLUG_UNIQUE) => {
                FulfillmentError::Conflict("A category with this slug already exists".into())
            }
            Some(constraint::ORDER_ITEM_UNIQUE_PRODUCT) => {
                FulfillmentError::Conflict("The product is already on this order".into())
            }
            _ => match err {
                StoreError::NotFound { entity, id } => FulfillmentError::NotFound { entity, id },
                other => FulfillmentError::Store(other),
            },
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
