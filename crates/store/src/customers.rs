//! Customer records.

use common::CustomerId;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, Row, postgres::PgRow};

use crate::Result;

/// A customer on file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Fields for creating or updating a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

fn row_to_customer(row: &PgRow) -> Result<Customer> {
    Ok(Customer {
        id: CustomerId::new(row.try_get("customer_id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
    })
}

/// Inserts a new customer and returns the stored record.
pub async fn insert(exec: impl PgExecutor<'_>, customer: &NewCustomer) -> Result<Customer> {
    let row = sqlx::query(
        r#"
        INSERT INTO customers (name, email, phone)
        VALUES ($1, $2, $3)
        RETURNING customer_id, name, email, phone
        "#,
    )
    .bind(&customer.name)
    .bind(&customer.email)
    .bind(&customer.phone)
    .fetch_one(exec)
    .await?;

    row_to_customer(&row)
}

/// Lists all customers.
pub async fn list(exec: impl PgExecutor<'_>) -> Result<Vec<Customer>> {
    let rows = sqlx::query(
        "SELECT customer_id, name, email, phone FROM customers ORDER BY customer_id",
    )
    .fetch_all(exec)
    .await?;

    rows.iter().map(row_to_customer).collect()
}

/// Fetches a customer by ID.
pub async fn fetch(exec: impl PgExecutor<'_>, id: CustomerId) -> Result<Option<Customer>> {
    let row = sqlx::query(
        "SELECT customer_id, name, email, phone FROM customers WHERE customer_id = $1",
    )
    .bind(id.as_i64())
    .fetch_optional(exec)
    .await?;

    row.as_ref().map(row_to_customer).transpose()
}

/// Updates a customer in place. Returns false if the customer does not exist.
pub async fn update(
    exec: impl PgExecutor<'_>,
    id: CustomerId,
    customer: &NewCustomer,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE customers SET name = $1, email = $2, phone = $3 WHERE customer_id = $4",
    )
    .bind(&customer.name)
    .bind(&customer.email)
    .bind(&customer.phone)
    .bind(id.as_i64())
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Deletes a customer. Returns false if the customer does not exist.
pub async fn delete(exec: impl PgExecutor<'_>, id: CustomerId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM customers WHERE customer_id = $1")
        .bind(id.as_i64())
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns true if a customer with the given ID exists.
pub async fn exists(exec: impl PgExecutor<'_>, id: CustomerId) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE customer_id = $1)")
            .bind(id.as_i64())
            .fetch_one(exec)
            .await?;
    Ok(exists)
}

/// Returns true if a customer already uses the given email.
pub async fn email_taken(exec: impl PgExecutor<'_>, email: &str) -> Result<bool> {
    let taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM customers WHERE email = $1)")
            .bind(email)
            .fetch_one(exec)
            .await?;
    Ok(taken)
}
