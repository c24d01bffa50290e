//! Order lifecycle and batch endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::OrderId;
use engine::{BatchReport, OrderDraft};
use serde::Deserialize;
use store::orders::{Order, StatusEvent};

use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct BatchRequest {
    pub orders: Vec<OrderDraft>,
}

/// Field-level checks owed to the engine: the draft must carry a positive
/// customer reference, at least one item, and positive item fields. The
/// engine re-validates everything that touches its own invariants.
fn check_fields(draft: &OrderDraft) -> Result<(), ApiError> {
    if draft.customer_id.as_i64() <= 0 {
        return Err(ApiError::BadRequest("customer_id must be positive".to_string()));
    }
    if draft.items.is_empty() {
        return Err(ApiError::BadRequest("order items must not be empty".to_string()));
    }
    for item in &draft.items {
        if item.menu_item_id.as_i64() <= 0 {
            return Err(ApiError::BadRequest("menu_item_id must be positive".to_string()));
        }
        if item.quantity == 0 {
            return Err(ApiError::BadRequest("item quantity must be positive".to_string()));
        }
    }
    Ok(())
}

/// POST /orders — validate, price, and create a new active order.
#[tracing::instrument(skip(state, draft))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    check_fields(&draft)?;
    let order = state.orders.create(&draft).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders — list all orders with their items.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list().await?))
}

/// GET /orders/{id} — fetch one order with its items.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.get(OrderId::new(id)).await?))
}

/// PUT /orders/{id} — re-validate, re-price, and replace an active order.
#[tracing::instrument(skip(state, draft))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(draft): Json<OrderDraft>,
) -> Result<Json<Order>, ApiError> {
    check_fields(&draft)?;
    Ok(Json(state.orders.update(OrderId::new(id), &draft).await?))
}

/// DELETE /orders/{id} — hard-delete an order. Stock is not restored.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.orders.delete(OrderId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /orders/{id}/close — close an order and deduct its ingredients.
/// The body lists reorder candidates only when some exist.
#[tracing::instrument(skip(state))]
pub async fn close(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    match state.orders.close(OrderId::new(id)).await? {
        Some(alert) => Ok(Json(alert).into_response()),
        None => Ok(StatusCode::OK.into_response()),
    }
}

/// GET /orders/{id}/history — the order's append-only status events.
#[tracing::instrument(skip(state))]
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StatusEvent>>, ApiError> {
    Ok(Json(state.orders.status_history(OrderId::new(id)).await?))
}

/// POST /orders/batch-process — process a list of candidate orders in one
/// all-or-nothing transaction and return the per-order report.
#[tracing::instrument(skip(state, request))]
pub async fn batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchReport>, ApiError> {
    Ok(Json(state.orders.process_batch(&request.orders).await?))
}
