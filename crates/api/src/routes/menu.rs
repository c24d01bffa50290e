//! Menu CRUD and price history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::MenuItemId;
use store::menu::{self, MenuItem, NewMenuItem, PriceHistoryEntry};
use store::{StoreError, inventory};

use crate::AppState;
use crate::error::ApiError;

async fn check_fields(state: &AppState, item: &NewMenuItem) -> Result<(), ApiError> {
    if item.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    for edge in &item.ingredients {
        if edge.quantity <= 0.0 {
            return Err(ApiError::BadRequest(
                "ingredient quantity must be positive".to_string(),
            ));
        }
        if !inventory::exists(&state.pool, edge.inventory_id).await? {
            return Err(ApiError::BadRequest(format!(
                "recipe references unknown inventory item: {}",
                edge.inventory_id
            )));
        }
    }
    Ok(())
}

/// POST /menu — add a menu item with its recipe.
#[tracing::instrument(skip(state, item))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(item): Json<NewMenuItem>,
) -> Result<(StatusCode, Json<MenuItem>), ApiError> {
    check_fields(&state, &item).await?;
    if menu::name_taken(&state.pool, &item.name).await? {
        return Err(ApiError::BadRequest(format!(
            "menu item name already exists: {}",
            item.name
        )));
    }

    let mut tx = state.pool.begin().await.map_err(StoreError::from)?;
    let stored = menu::insert(&mut tx, &item).await?;
    tx.commit().await.map_err(StoreError::from)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /menu — list all menu items with their recipes.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<MenuItem>>, ApiError> {
    let mut conn = state.pool.acquire().await.map_err(StoreError::from)?;
    Ok(Json(menu::list(&mut conn).await?))
}

/// GET /menu/{id} — fetch one menu item with its recipe.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MenuItem>, ApiError> {
    let mut conn = state.pool.acquire().await.map_err(StoreError::from)?;
    menu::fetch(&mut conn, MenuItemId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("menu item {id} not found")))
}

/// PUT /menu/{id} — update a menu item, replacing its recipe. A price
/// change appends a price history row in the same transaction.
#[tracing::instrument(skip(state, item))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(item): Json<NewMenuItem>,
) -> Result<Json<MenuItem>, ApiError> {
    check_fields(&state, &item).await?;
    let id = MenuItemId::new(id);

    let mut tx = state.pool.begin().await.map_err(StoreError::from)?;
    if !menu::update(&mut tx, id, &item).await? {
        return Err(ApiError::NotFound(format!("menu item {id} not found")));
    }
    let stored = menu::fetch(&mut tx, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("menu item {id} not found")))?;
    tx.commit().await.map_err(StoreError::from)?;
    Ok(Json(stored))
}

/// DELETE /menu/{id} — remove a menu item and its recipe edges.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !menu::delete(&state.pool, MenuItemId::new(id)).await? {
        return Err(ApiError::NotFound(format!("menu item {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /menu-price-history — list all recorded price changes.
#[tracing::instrument(skip(state))]
pub async fn price_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PriceHistoryEntry>>, ApiError> {
    Ok(Json(menu::price_history(&state.pool).await?))
}

/// GET /menu/{id}/price-history — price changes for one menu item.
#[tracing::instrument(skip(state))]
pub async fn price_history_for(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PriceHistoryEntry>>, ApiError> {
    let id = MenuItemId::new(id);
    if !menu::exists(&state.pool, id).await? {
        return Err(ApiError::NotFound(format!("menu item {id} not found")));
    }
    Ok(Json(menu::price_history_for(&state.pool, id).await?))
}
