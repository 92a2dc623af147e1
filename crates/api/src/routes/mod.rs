//! HTTP handlers.

pub mod admin;
pub mod catalog;
pub mod health;
pub mod metrics;
pub mod orders;

use std::str::FromStr;

use axum::Json;
use axum::http::HeaderName;
use axum::response::{IntoResponse, Response};
use cache::Cached;
use serde::Serialize;

use crate::error::ApiError;

/// Reports whether a read was served from the cache.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// A cached read as JSON with its `X-Cache` header.
pub(crate) fn cached_json<T: Serialize>(cached: Cached<T>) -> Response {
    ([(X_CACHE, cached.status.as_str())], Json(cached.value)).into_response()
}

pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} id: {raw}")))
}
