//! Order endpoints for customers (and staff acting on their behalf).

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use common::{Identity, OrderId, OrderItemId, ProductId};
use domain::{OrderItemUpdate, OrderStatus, RequestedLine};
use fulfillment::FulfillmentError;
use queries::OrderView;
use serde::Deserialize;
use store::Store;

use super::{cached_json, parse_id};
use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<RequestedLine>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

// -- Handlers --

/// POST /orders: reserves stock and creates a pending order.
#[tracing::instrument(skip(state, caller, payload), fields(user_id = %caller.user_id))]
pub async fn create<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let Json(req) = payload?;
    let created = state.reservations.reserve(caller, req.items).await?;
    let view = fresh_view(&state, caller, created.order.id()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /orders: the caller's orders, newest first by default.
#[tracing::instrument(skip(state, caller, pairs), fields(user_id = %caller.user_id))]
pub async fn list<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let page = state.order_reads.list_user_orders(caller, &pairs).await?;
    Ok(cached_json(page))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn get<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    let order = state.order_reads.get_order(caller, id).await?;
    Ok(cached_json(order))
}

/// PATCH /orders/{id}: `{"status": "..."}`
#[tracing::instrument(skip(state, caller, payload), fields(user_id = %caller.user_id))]
pub async fn update_status<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderView>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    let Json(req) = payload?;
    let target: OrderStatus = req.status.parse().map_err(FulfillmentError::from)?;

    state.status.transition(caller, id, target).await?;
    Ok(Json(fresh_view(&state, caller, id).await?))
}

/// POST /orders/{id}/items
#[tracing::instrument(skip(state, caller, payload), fields(user_id = %caller.user_id))]
pub async fn add_item<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    let Json(req) = payload?;

    state
        .items
        .add_item(caller, id, req.product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(fresh_view(&state, caller, id).await?)))
}

/// PATCH /orders/{id}/items/{item_id}
#[tracing::instrument(skip(state, caller, payload), fields(user_id = %caller.user_id))]
pub async fn update_item<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path((id, item_id)): Path<(String, String)>,
    payload: Result<Json<OrderItemUpdate>, JsonRejection>,
) -> Result<Json<OrderView>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    let item_id: OrderItemId = parse_id(&item_id, "order item")?;
    let Json(update) = payload?;

    state.items.update_item(caller, id, item_id, update).await?;
    Ok(Json(fresh_view(&state, caller, id).await?))
}

/// DELETE /orders/{id}/items/{item_id}: returns the line's quantity to stock.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn remove_item<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<Json<OrderView>, ApiError> {
    let id: OrderId = parse_id(&id, "order")?;
    let item_id: OrderItemId = parse_id(&item_id, "order item")?;

    state.items.remove_item(caller, id, item_id).await?;
    Ok(Json(fresh_view(&state, caller, id).await?))
}

/// The order as just committed. The write invalidated its cached detail, so
/// this reloads it.
async fn fresh_view<S: Store + Clone>(
    state: &AppState<S>,
    caller: Identity,
    id: OrderId,
) -> Result<OrderView, ApiError> {
    Ok(state.order_reads.get_order(caller, id).await?.value)
}
