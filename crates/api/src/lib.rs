//! HTTP API server with observability for the online store.
//!
//! Provides REST endpoints for the catalog, order placement and order
//! management, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use cache::CacheClient;
use fulfillment::TaskQueue;
use fulfillment::tasks::FailedTasks;
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{admin, catalog, orders};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // catalog
        .route("/categories", get(catalog::list_categories::<S>))
        .route(
            "/categories/{id}",
            get(catalog::get_category::<S>).delete(catalog::delete_category::<S>),
        )
        .route("/products", get(catalog::list_products::<S>))
        .route("/products/{id}", get(catalog::get_product::<S>))
        // orders
        .route("/orders", post(orders::create::<S>).get(orders::list::<S>))
        .route(
            "/orders/{id}",
            get(orders::get::<S>).patch(orders::update_status::<S>),
        )
        .route("/orders/{id}/items", post(orders::add_item::<S>))
        .route(
            "/orders/{id}/items/{item_id}",
            patch(orders::update_item::<S>).delete(orders::remove_item::<S>),
        )
        // staff
        .route("/admin/orders", get(admin::list_orders::<S>))
        .route("/admin/tasks/failed", get(admin::failed_tasks::<S>))
        .route("/admin/categories", post(catalog::create_category::<S>))
        .route("/admin/categories/{id}", patch(catalog::update_category::<S>))
        .route("/admin/products", post(catalog::create_product::<S>))
        .route(
            "/admin/products/{id}",
            patch(catalog::update_product::<S>).delete(catalog::deactivate_product::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store` and `cache`.
///
/// `tasks` receives deferred work; `failed_tasks` is the dead-letter list the
/// task workers record into.
pub fn create_state<S: Store + Clone>(
    store: S,
    cache: Arc<dyn CacheClient>,
    config: &Config,
    tasks: Arc<dyn TaskQueue>,
    failed_tasks: FailedTasks,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, cache, config, tasks, failed_tasks))
}
