//! Staff-only endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::response::Response;
use fulfillment::tasks::FailedTask;
use store::Store;

use super::cached_json;
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

/// GET /admin/orders: every order, filterable by status, user and date.
#[tracing::instrument(skip(state, caller, pairs), fields(user_id = %caller.0.user_id))]
pub async fn list_orders<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    caller.require_staff()?;
    let page = state.order_reads.list_admin_orders(caller.0, &pairs).await?;
    Ok(cached_json(page))
}

/// GET /admin/tasks/failed: deferred tasks that exhausted their retries.
#[tracing::instrument(skip(state, caller))]
pub async fn failed_tasks<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<Vec<FailedTask>>, ApiError> {
    caller.require_staff()?;
    Ok(Json(state.failed_tasks.list()))
}
