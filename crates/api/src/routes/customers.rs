//! Customer CRUD endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::CustomerId;
use store::customers::{self, Customer, NewCustomer};

use crate::AppState;
use crate::error::ApiError;

fn check_fields(customer: &NewCustomer) -> Result<(), ApiError> {
    if customer.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    if customer.email.trim().is_empty() || !customer.email.contains('@') {
        return Err(ApiError::BadRequest("email is not valid".to_string()));
    }
    Ok(())
}

/// POST /customers — register a customer. Emails are unique.
#[tracing::instrument(skip(state, customer))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(customer): Json<NewCustomer>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    check_fields(&customer)?;
    if customers::email_taken(&state.pool, &customer.email).await? {
        return Err(ApiError::BadRequest(format!(
            "customer email already exists: {}",
            customer.email
        )));
    }
    let stored = customers::insert(&state.pool, &customer).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// GET /customers — list all customers.
#[tracing::instrument(skip(state))]
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Customer>>, ApiError> {
    Ok(Json(customers::list(&state.pool).await?))
}

/// GET /customers/{id} — fetch one customer.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    customers::fetch(&state.pool, CustomerId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("customer {id} not found")))
}

/// PUT /customers/{id} — update a customer in place.
#[tracing::instrument(skip(state, customer))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(customer): Json<NewCustomer>,
) -> Result<Json<Customer>, ApiError> {
    check_fields(&customer)?;
    let id = CustomerId::new(id);
    if !customers::update(&state.pool, id, &customer).await? {
        return Err(ApiError::NotFound(format!("customer {id} not found")));
    }
    customers::fetch(&state.pool, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("customer {id} not found")))
}

/// DELETE /customers/{id} — remove a customer.
#[tracing::instrument(skip(state))]
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if !customers::delete(&state.pool, CustomerId::new(id)).await? {
        return Err(ApiError::NotFound(format!("customer {id} not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
