//! Read-side error types.

use thiserror::Error;

/// Errors that can occur while serving a read.
///
/// Cache failures never show up here; reads fall through to the store.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The store of record could not be read.
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// The entity does not exist or is not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// The caller may not read this resource.
    #[error("You do not have permission to perform this action")]
    PermissionDenied,
}

impl QueryError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        QueryError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Result type for read operations.
pub type Result<T> = std::result::Result<T, QueryError>;
