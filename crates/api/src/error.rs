//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use fulfillment::FulfillmentError;
use queries::QueryError;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
///
/// Bodies are `{"error": message, "code": tag, ...detail}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No identity headers on a route that needs one.
    #[error("Authentication credentials were not provided")]
    Unauthenticated,

    /// The caller lacks the staff role.
    #[error("You do not have permission to perform this action")]
    Forbidden,

    /// Malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// A write was rejected.
    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),

    /// A read was rejected.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

struct ErrorBody {
    status: StatusCode,
    code: &'static str,
    message: String,
    detail: Map<String, Value>,
}

impl ErrorBody {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            detail: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.detail.insert(key.to_string(), value);
        self
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self {
            ApiError::Unauthenticated => ErrorBody::new(
                StatusCode::UNAUTHORIZED,
                "unauthenticated",
                "Authentication credentials were not provided",
            ),
            ApiError::Forbidden => ErrorBody::new(
                StatusCode::FORBIDDEN,
                "permission_denied",
                "You do not have permission to perform this action",
            ),
            ApiError::BadRequest(msg) => ErrorBody::new(StatusCode::BAD_REQUEST, "validation", msg),
            ApiError::Fulfillment(err) => fulfillment_error_body(err),
            ApiError::Query(err) => query_error_body(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                ErrorBody::internal()
            }
        };

        metrics::counter!("api_errors_total", "code" => body.code).increment(1);

        let mut payload = Map::new();
        payload.insert("error".into(), Value::String(body.message));
        payload.insert("code".into(), Value::String(body.code.into()));
        payload.extend(body.detail);
        (body.status, Json(Value::Object(payload))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn fulfillment_error_body(err: FulfillmentError) -> ErrorBody {
    let message = err.to_string();
    match err {
        FulfillmentError::Order(order_err) => order_error_body(order_err),
        FulfillmentError::Catalog(_) => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "validation", message)
        }
        FulfillmentError::Store(store_err) => {
            tracing::error!(error = %store_err, "store error");
            ErrorBody::internal()
        }
        FulfillmentError::ProductsUnavailable { product_ids } => ErrorBody::new(
            StatusCode::BAD_REQUEST,
            "products_unavailable",
            "Products not found or inactive",
        )
        .with("product_ids", json!(product_ids)),
        FulfillmentError::InsufficientStock { shortfalls } => {
            let details: Vec<Value> = shortfalls
                .iter()
                .map(|s| {
                    json!({
                        "product_id": s.product_id,
                        "available": s.available,
                        "requested": s.requested,
                    })
                })
                .collect();
            ErrorBody::new(StatusCode::CONFLICT, "insufficient_stock", "Insufficient stock")
                .with("details", Value::Array(details))
        }
        FulfillmentError::NotFound { .. } => {
            ErrorBody::new(StatusCode::NOT_FOUND, "not_found", message)
        }
        FulfillmentError::PermissionDenied => ErrorBody::new(
            StatusCode::FORBIDDEN,
            "permission_denied",
            "You do not have permission to perform this action",
        ),
        FulfillmentError::CategoryInUse { products, .. } => {
            ErrorBody::new(StatusCode::CONFLICT, "category_in_use", message)
                .with("products", json!(products))
        }
        FulfillmentError::Conflict(msg) => ErrorBody::new(StatusCode::CONFLICT, "conflict", msg),
    }
}

fn order_error_body(err: OrderError) -> ErrorBody {
    let message = err.to_string();
    match err {
        OrderError::InvalidTransition { from, to } => {
            ErrorBody::new(StatusCode::CONFLICT, "invalid_transition", message)
                .with("from", json!(from))
                .with("to", json!(to))
        }
        OrderError::ReadOnly { status } => {
            ErrorBody::new(StatusCode::CONFLICT, "read_only_order", message)
                .with("status", json!(status))
        }
        OrderError::ImmutableField { field } => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "immutable_field", message)
                .with("field", json!(field))
        }
        OrderError::EmptyOrder
        | OrderError::InvalidQuantity { .. }
        | OrderError::QuantityOverflow { .. }
        | OrderError::NegativePrice { .. }
        | OrderError::NegativeTotal { .. }
        | OrderError::TotalOverflow { .. }
        | OrderError::UnknownStatus { .. } => {
            ErrorBody::new(StatusCode::BAD_REQUEST, "validation", message)
        }
    }
}

fn query_error_body(err: QueryError) -> ErrorBody {
    let message = err.to_string();
    match err {
        QueryError::Store(store_err) => {
            tracing::error!(error = %store_err, "store error");
            ErrorBody::internal()
        }
        QueryError::NotFound { .. } => ErrorBody::new(StatusCode::NOT_FOUND, "not_found", message),
        QueryError::PermissionDenied => {
            ErrorBody::new(StatusCode::FORBIDDEN, "permission_denied", message)
        }
    }
}
