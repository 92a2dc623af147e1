use thiserror::Error;

/// Constraint names shared by both store implementations.
pub mod constraint {
    pub const CATEGORY_NAME_UNIQUE: &str = "categories_name_key";
    pub const CATEGORY_SLUG_UNIQUE: &str = "categories_slug_key";
    pub const PRODUCT_CATEGORY_FK: &str = "products_category_id_fkey";
    pub const PRODUCT_STOCK_NON_NEGATIVE: &str = "products_stock_non_negative";
    pub const ORDER_TOTAL_NON_NEGATIVE: &str = "orders_total_non_negative";
    pub const ORDER_ITEM_UNIQUE_PRODUCT: &str = "order_items_order_product_key";
    pub const ORDER_ITEM_PRODUCT_FK: &str = "order_items_product_id_fkey";
}

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A write violated a uniqueness, foreign key or check constraint.
    #[error("Constraint violated: {constraint}")]
    Constraint { constraint: String },

    /// The row to update or delete does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// A persisted value could not be mapped to a domain type.
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },

    /// The transaction could not be committed.
    #[error("Commit failed: {0}")]
    Commit(String),
}

impl StoreError {
    pub fn constraint(name: &str) -> Self {
        StoreError::Constraint {
            constraint: name.to_string(),
        }
    }

    /// Returns the violated constraint name, if any.
    pub fn constraint_name(&self) -> Option<&str> {
        match self {
            StoreError::Constraint { constraint } => Some(constraint),
            _ => None,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
