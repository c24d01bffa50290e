//! HTTP API server for the coffee shop order and inventory service.
//!
//! Routes are thin plumbing over the store and the order engine: they
//! parse and field-validate requests, delegate, and map engine outcomes
//! to transport status codes. Structured logging (tracing) and Prometheus
//! metrics come along for every request.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use engine::OrderService;
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: OrderService,
    pub pool: PgPool,
}

/// Creates the application state over a connected pool.
pub fn create_state(pool: PgPool) -> Arc<AppState> {
    Arc::new(AppState {
        orders: OrderService::new(pool.clone()),
        pool,
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        // Orders
        .route("/orders", post(routes::orders::create))
        .route("/orders", get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}", put(routes::orders::update))
        .route("/orders/{id}", delete(routes::orders::remove))
        .route("/orders/{id}/close", post(routes::orders::close))
        .route("/orders/{id}/history", get(routes::orders::history))
        .route("/orders/batch-process", post(routes::orders::batch))
        // Inventory
        .route("/inventory", post(routes::inventory::create))
        .route("/inventory", get(routes::inventory::list))
        .route("/inventory/{id}", get(routes::inventory::get))
        .route("/inventory/{id}", put(routes::inventory::update))
        .route("/inventory/{id}", delete(routes::inventory::remove))
        .route("/inventory/{id}/transactions", get(routes::inventory::transactions_for))
        .route("/inventory-transactions", get(routes::inventory::transactions))
        .route("/inventory-transactions", post(routes::inventory::restock))
        // Menu
        .route("/menu", post(routes::menu::create))
        .route("/menu", get(routes::menu::list))
        .route("/menu/{id}", get(routes::menu::get))
        .route("/menu/{id}", put(routes::menu::update))
        .route("/menu/{id}", delete(routes::menu::remove))
        .route("/menu/{id}/price-history", get(routes::menu::price_history_for))
        .route("/menu-price-history", get(routes::menu::price_history))
        // Customers
        .route("/customers", post(routes::customers::create))
        .route("/customers", get(routes::customers::list))
        .route("/customers/{id}", get(routes::customers::get))
        .route("/customers/{id}", put(routes::customers::update))
        .route("/customers/{id}", delete(routes::customers::remove))
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
