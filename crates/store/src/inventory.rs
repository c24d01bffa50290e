//! Inventory items and the stock ledger.
//!
//! `inventory.stock_level` is only ever written here: deductions go through
//! the guarded [`deduct`] update, restocks through [`restock`], and both
//! run inside whatever transaction the caller has open.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{InventoryId, Money};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, Row, postgres::PgRow};

use crate::Result;

/// An ingredient tracked in the stock ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryId,
    pub name: String,
    pub stock_level: f64,
    pub unit_type: String,
    pub reorder_level: f64,
    pub last_updated: DateTime<Utc>,
}

/// Fields for creating or updating an inventory item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub stock_level: f64,
    pub unit_type: String,
    pub reorder_level: f64,
}

/// An append-only restock record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: i64,
    pub inventory_id: InventoryId,
    pub price: Money,
    pub quantity: f64,
    pub transaction_date: DateTime<Utc>,
}

/// Fields for recording a restock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryTransaction {
    pub inventory_id: InventoryId,
    pub price: Money,
    pub quantity: f64,
}

fn row_to_item(row: &PgRow) -> Result<InventoryItem> {
    Ok(InventoryItem {
        id: InventoryId::new(row.try_get("inventory_id")?),
        name: row.try_get("name")?,
        stock_level: row.try_get("stock_level")?,
        unit_type: row.try_get("unit_type")?,
        reorder_level: row.try_get("reorder_level")?,
        last_updated: row.try_get("last_updated")?,
    })
}

fn row_to_transaction(row: &PgRow) -> Result<InventoryTransaction> {
    Ok(InventoryTransaction {
        id: row.try_get("transaction_id")?,
        inventory_id: InventoryId::new(row.try_get("inventory_id")?),
        price: Money::from_cents(row.try_get("price")?),
        quantity: row.try_get("quantity")?,
        transaction_date: row.try_get("transaction_date")?,
    })
}

/// Inserts a new inventory item and returns the stored record.
pub async fn insert(exec: impl PgExecutor<'_>, item: &NewInventoryItem) -> Result<InventoryItem> {
    let row = sqlx::query(
        r#"
        INSERT INTO inventory (name, stock_level, unit_type, reorder_level)
        VALUES ($1, $2, $3, $4)
        RETURNING inventory_id, name, stock_level, unit_type, reorder_level, last_updated
        "#,
    )
    .bind(&item.name)
    .bind(item.stock_level)
    .bind(&item.unit_type)
    .bind(item.reorder_level)
    .fetch_one(exec)
    .await?;

    row_to_item(&row)
}

/// Lists all inventory items.
pub async fn list(exec: impl PgExecutor<'_>) -> Result<Vec<InventoryItem>> {
    let rows = sqlx::query(
        r#"
        SELECT inventory_id, name, stock_level, unit_type, reorder_level, last_updated
        FROM inventory
        ORDER BY inventory_id
        "#,
    )
    .fetch_all(exec)
    .await?;

    rows.iter().map(row_to_item).collect()
}

/// Fetches an inventory item by ID.
pub async fn fetch(exec: impl PgExecutor<'_>, id: InventoryId) -> Result<Option<InventoryItem>> {
    let row = sqlx::query(
        r#"
        SELECT inventory_id, name, stock_level, unit_type, reorder_level, last_updated
        FROM inventory
        WHERE inventory_id = $1
        "#,
    )
    .bind(id.as_i64())
    .fetch_optional(exec)
    .await?;

    row.as_ref().map(row_to_item).transpose()
}

/// Updates an inventory item in place. Returns false if the item does not exist.
pub async fn update(
    exec: impl PgExecutor<'_>,
    id: InventoryId,
    item: &NewInventoryItem,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE inventory
        SET name = $1, stock_level = $2, unit_type = $3, reorder_level = $4, last_updated = NOW()
        WHERE inventory_id = $5
        "#,
    )
    .bind(&item.name)
    .bind(item.stock_level)
    .bind(&item.unit_type)
    .bind(item.reorder_level)
    .bind(id.as_i64())
    .execute(exec)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Deletes an inventory item. Returns false if the item does not exist.
pub async fn delete(exec: impl PgExecutor<'_>, id: InventoryId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM inventory WHERE inventory_id = $1")
        .bind(id.as_i64())
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns true if an inventory item with the given ID exists.
pub async fn exists(exec: impl PgExecutor<'_>, id: InventoryId) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM inventory WHERE inventory_id = $1)")
            .bind(id.as_i64())
            .fetch_one(exec)
            .await?;
    Ok(exists)
}

/// Returns true if an inventory item already uses the given name.
pub async fn name_taken(exec: impl PgExecutor<'_>, name: &str) -> Result<bool> {
    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM inventory WHERE name = $1)")
        .bind(name)
        .fetch_one(exec)
        .await?;
    Ok(taken)
}

/// Reads current stock levels for the given ingredients.
///
/// Ingredients that do not exist are simply absent from the returned map;
/// sufficiency checks treat a missing entry as zero stock.
pub async fn stock_levels(
    exec: impl PgExecutor<'_>,
    ids: &[InventoryId],
) -> Result<HashMap<InventoryId, f64>> {
    let raw: Vec<i64> = ids.iter().map(InventoryId::as_i64).collect();
    let rows = sqlx::query("SELECT inventory_id, stock_level FROM inventory WHERE inventory_id = ANY($1)")
        .bind(raw)
        .fetch_all(exec)
        .await?;

    let mut levels = HashMap::with_capacity(rows.len());
    for row in rows {
        levels.insert(
            InventoryId::new(row.try_get("inventory_id")?),
            row.try_get::<f64, _>("stock_level")?,
        );
    }
    Ok(levels)
}

/// Deducts the given quantities from stock in a single guarded update.
///
/// Every row decrement is conditioned on `stock_level >= qty`; the returned
/// count is the number of rows actually decremented. A caller holding a
/// transaction must treat a count smaller than the requirement size as
/// insufficiency and roll the transaction back, so the deduction is
/// all-ingredients-or-none.
pub async fn deduct(conn: &mut PgConnection, requirement: &[(InventoryId, f64)]) -> Result<u64> {
    let ids: Vec<i64> = requirement.iter().map(|(id, _)| id.as_i64()).collect();
    let quantities: Vec<f64> = requirement.iter().map(|(_, qty)| *qty).collect();

    let result = sqlx::query(
        r#"
        UPDATE inventory AS i
        SET stock_level = i.stock_level - r.qty, last_updated = NOW()
        FROM UNNEST($1::bigint[], $2::double precision[]) AS r(inventory_id, qty)
        WHERE i.inventory_id = r.inventory_id AND i.stock_level >= r.qty
        "#,
    )
    .bind(ids)
    .bind(quantities)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Records a restock: inserts the transaction row and increments the item's
/// stock by the same quantity. Runs inside the caller's transaction so both
/// writes commit or roll back together.
pub async fn restock(
    conn: &mut PgConnection,
    transaction: &NewInventoryTransaction,
) -> Result<InventoryTransaction> {
    let row = sqlx::query(
        r#"
        INSERT INTO inventory_transactions (inventory_id, price, quantity)
        VALUES ($1, $2, $3)
        RETURNING transaction_id, inventory_id, price, quantity, transaction_date
        "#,
    )
    .bind(transaction.inventory_id.as_i64())
    .bind(transaction.price.cents())
    .bind(transaction.quantity)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        UPDATE inventory
        SET stock_level = stock_level + $1, last_updated = NOW()
        WHERE inventory_id = $2
        "#,
    )
    .bind(transaction.quantity)
    .bind(transaction.inventory_id.as_i64())
    .execute(&mut *conn)
    .await?;

    row_to_transaction(&row)
}

/// Returns every item at or below its reorder threshold, lowest stock first.
pub async fn reorder_candidates(exec: impl PgExecutor<'_>) -> Result<Vec<InventoryItem>> {
    let rows = sqlx::query(
        r#"
        SELECT inventory_id, name, stock_level, unit_type, reorder_level, last_updated
        FROM inventory
        WHERE stock_level <= reorder_level
        ORDER BY stock_level, inventory_id
        "#,
    )
    .fetch_all(exec)
    .await?;

    rows.iter().map(row_to_item).collect()
}

/// Lists all restock transactions.
pub async fn transactions(exec: impl PgExecutor<'_>) -> Result<Vec<InventoryTransaction>> {
    let rows = sqlx::query(
        r#"
        SELECT transaction_id, inventory_id, price, quantity, transaction_date
        FROM inventory_transactions
        ORDER BY transaction_id
        "#,
    )
    .fetch_all(exec)
    .await?;

    rows.iter().map(row_to_transaction).collect()
}

/// Lists restock transactions for one inventory item.
pub async fn transactions_for(
    exec: impl PgExecutor<'_>,
    id: InventoryId,
) -> Result<Vec<InventoryTransaction>> {
    let rows = sqlx::query(
        r#"
        SELECT transaction_id, inventory_id, price, quantity, transaction_date
        FROM inventory_transactions
        WHERE inventory_id = $1
        ORDER BY transaction_id
        "#,
    )
    .bind(id.as_i64())
    .fetch_all(exec)
    .await?;

    rows.iter().map(row_to_transaction).collect()
}
