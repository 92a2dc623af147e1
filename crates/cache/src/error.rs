use thiserror::Error;

/// Errors raised by cache backends.
///
/// None of these ever fail a request: readers fall through to the store and
/// writers log and move on.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// The backend does not implement the operation.
    #[error("Cache operation not supported: {0}")]
    Unsupported(&'static str),

    /// A counter key holds something other than an integer.
    #[error("Value at {key} is not an integer")]
    NotAnInteger { key: String },

    /// A Redis command failed.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A cached payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
