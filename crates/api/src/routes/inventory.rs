//! Inventory CRUD and restock endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::InventoryId;
use store::inventory::{
    self, InventoryItem, InventoryTransaction, NewInventoryItem, NewInventoryTransaction,
};

use crate::AppState;
use crate::error::ApiError;

fn check_fields(item: &NewInventoryItem) -> Result<(), ApiError> {
    if item.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    if item.stock_level < 0.0 {
        return Err(ApiError::BadRequest("stock_level must not be negative".to_string()));
    }
    if item.reorder_level < 0.0 {
        return Err(ApiError::BadRequest("reorder_level must not be negative".to_string()));
    }
    Ok(())
}

/// POST /inventory — add a new ingredient to the stock ledger.
#[tracing::instrument(skip(state, item))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(item): Json<NewInventoryItem>,
) -> Result<(StatusCode, Json<InventoryItem>), ApiError> {
    check_fields(&item)?;
    if inventory::name_taken(&state.pool, &item.name).await? {
        return Err(ApiError::BadRequest(format!(
            "inventory item name already exists: {}",
            item.name
        )));
    }
    let stored = inventory::insert(&state.pool, &item).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /inventory — list all ingredients.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<InventoryItem>>, ApiError> {
    Ok(Json(inventory::list(&state.pool).await?))
}

/// GET /inventory/{id} — fetch one ingredient.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<InventoryItem>, ApiError> {
    inventory::fetch(&state.pool, InventoryId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("inventory item {id} not found")))
}

/// PUT /inventory/{id} — update an ingredient in place.
#[tracing::instrument(skip(state, item))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(item): Json<NewInventoryItem>,
) -> Result<Json<InventoryItem>, ApiError> {
    check_fields(&item)?;
    let id = InventoryId::new(id);
    if !inventory::update(&state.pool, id, &item).await? {
        return Err(ApiError::NotFound(format!("inventory item {id} not found")));
    }
    inventory::fetch(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("inventory item {id} not found")))
}

/// DELETE /inventory/{id} — remove an ingredient.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !inventory::delete(&state.pool, InventoryId::new(id)).await? {
        return Err(ApiError::NotFound(format!("inventory item {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// POST /inventory-transactions — restock an ingredient. The transaction
/// record and the stock increment commit atomically.
#[tracing::instrument(skip(state, transaction))]
pub async fn restock(
    State(state): State<Arc<AppState>>,
    Json(transaction): Json<NewInventoryTransaction>,
) -> Result<(StatusCode, Json<InventoryTransaction>), ApiError> {
    let stored = engine::restock(&state.pool, &transaction).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /inventory-transactions — list all restock records.
#[tracing::instrument(skip(state))]
pub async fn transactions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<InventoryTransaction>>, ApiError> {
    Ok(Json(inventory::transactions(&state.pool).await?))
}

/// GET /inventory/{id}/transactions — list restock records for one ingredient.
#[tracing::instrument(skip(state))]
pub async fn transactions_for(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<InventoryTransaction>>, ApiError> {
    let id = InventoryId::new(id);
    if !inventory::exists(&state.pool, id).await? {
        return Err(ApiError::NotFound(format!("inventory item {id} not found")));
    }
    Ok(Json(inventory::transactions_for(&state.pool, id).await?))
}
