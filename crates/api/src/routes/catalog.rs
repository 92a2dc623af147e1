//! Catalog endpoints: public reads and staff maintenance.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use common::{CategoryId, ProductId};
use domain::{Category, CategoryUpdate, NewCategory, NewProduct, Product, ProductUpdate};
use fulfillment::FulfillmentError;
use serde::Deserialize;
use store::Store;

use super::{cached_json, parse_id};
use crate::error::ApiError;
use crate::identity::{Caller, MaybeCaller};
use crate::state::AppState;

type QueryPairs = Query<Vec<(String, String)>>;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteParams {
    pub hard: Option<String>,
}

impl DeleteParams {
    fn is_hard(&self) -> bool {
        self.hard
            .as_deref()
            .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
    }
}

// -- Public reads --

/// GET /categories
#[tracing::instrument(skip(state, pairs))]
pub async fn list_categories<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Query(pairs): QueryPairs,
) -> Result<Response, ApiError> {
    let categories = state.catalog_reads.list_categories(&pairs).await?;
    Ok(cached_json(categories))
}

/// GET /categories/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn get_category<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    MaybeCaller(caller): MaybeCaller,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: CategoryId = parse_id(&id, "category")?;
    let category = state.catalog_reads.get_category(caller, id).await?;
    Ok(cached_json(category))
}

/// GET /products
#[tracing::instrument(skip(state, pairs))]
pub async fn list_products<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Query(pairs): QueryPairs,
) -> Result<Response, ApiError> {
    let products = state.catalog_reads.list_products(&pairs).await?;
    Ok(cached_json(products))
}

/// GET /products/{id}
#[tracing::instrument(skip(state, caller))]
pub async fn get_product<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    MaybeCaller(caller): MaybeCaller,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: ProductId = parse_id(&id, "product")?;
    let product = state.catalog_reads.get_product(caller, id).await?;
    Ok(cached_json(product))
}

// -- Staff maintenance --

/// DELETE /categories/{id}?hard=true
#[tracing::instrument(skip(state, caller, params))]
pub async fn delete_category<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    let id: CategoryId = parse_id(&id, "category")?;
    state
        .catalog
        .delete_category(caller, id, params.is_hard())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/categories
#[tracing::instrument(skip(state, caller, payload))]
pub async fn create_category<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let Json(req) = payload?;
    let category =
        NewCategory::new(&req.name, req.slug.as_deref()).map_err(FulfillmentError::from)?;
    let created = state.catalog.create_category(caller, category).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /admin/categories/{id}
#[tracing::instrument(skip(state, caller, payload))]
pub async fn update_category<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<CategoryUpdate>, JsonRejection>,
) -> Result<Json<Category>, ApiError> {
    let id: CategoryId = parse_id(&id, "category")?;
    let Json(update) = payload?;
    let updated = state.catalog.update_category(caller, id, update).await?;
    Ok(Json(updated))
}

/// POST /admin/products
#[tracing::instrument(skip(state, caller, payload))]
pub async fn create_product<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let Json(product) = payload?;
    let created = state.catalog.create_product(caller, product).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /admin/products/{id}
#[tracing::instrument(skip(state, caller, payload))]
pub async fn update_product<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    payload: Result<Json<ProductUpdate>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id, "product")?;
    let Json(update) = payload?;
    let updated = state.catalog.update_product(caller, id, update).await?;
    Ok(Json(updated))
}

/// DELETE /admin/products/{id}: deactivates, never removes.
#[tracing::instrument(skip(state, caller))]
pub async fn deactivate_product<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ProductId = parse_id(&id, "product")?;
    state.catalog.deactivate_product(caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
