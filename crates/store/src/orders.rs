//! Orders, their line items, and the append-only status history.
//!
//! All writes here are meant to run inside a transaction owned by the
//! order engine; the engine is the sole writer of these tables.

use chrono::{DateTime, Utc};
use common::{CustomerId, MenuItemId, Money, OrderId, OrderStatus};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, Row, postgres::PgRow};

use crate::{Result, StoreError};

/// A persisted order with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub special_instructions: serde_json::Value,
    pub items: Vec<OrderItem>,
}

/// A persisted order line item. `price_at_order_time` is the line total
/// captured when the order was priced and never tracks later menu changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
    pub price_at_order_time: Money,
    pub customizations: serde_json::Value,
}

/// One append-only status transition record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub id: i64,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

/// A fully priced order ready for persistence.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: CustomerId,
    pub total_amount: Money,
    pub special_instructions: serde_json::Value,
    pub items: Vec<NewOrderItem>,
}

/// A priced line item ready for persistence.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
    pub price_at_order_time: Money,
    pub customizations: serde_json::Value,
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse()
        .map_err(|e: common::ParseOrderStatusError| StoreError::InvalidColumn(e.to_string()))
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::new(row.try_get("order_id")?),
        customer_id: CustomerId::new(row.try_get("customer_id")?),
        total_amount: Money::from_cents(row.try_get("total_amount")?),
        status: parse_status(&status)?,
        created_at: row.try_get("order_date")?,
        special_instructions: row.try_get("special_instructions")?,
        items: Vec::new(),
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    let quantity: i32 = row.try_get("quantity")?;
    Ok(OrderItem {
        id: row.try_get("order_item_id")?,
        order_id: OrderId::new(row.try_get("order_id")?),
        menu_item_id: MenuItemId::new(row.try_get("menu_item_id")?),
        quantity: quantity as u32,
        price_at_order_time: Money::from_cents(row.try_get("price_at_order_time")?),
        customizations: row.try_get("customizations")?,
    })
}

async fn insert_items(
    conn: &mut PgConnection,
    order_id: OrderId,
    items: &[NewOrderItem],
) -> Result<()> {
    for item in items {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, menu_item_id, quantity, price_at_order_time, customizations)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order_id.as_i64())
        .bind(item.menu_item_id.as_i64())
        .bind(item.quantity as i32)
        .bind(item.price_at_order_time.cents())
        .bind(&item.customizations)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn append_status_event(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO order_status_history (order_id, status, changed_at) VALUES ($1, $2, $3)")
        .bind(order_id.as_i64())
        .bind(status.as_str())
        .bind(at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Persists a new active order: the order row, its items, and the initial
/// "active" status event, inside the caller's transaction.
pub async fn insert(
    conn: &mut PgConnection,
    order: &NewOrder,
    at: DateTime<Utc>,
) -> Result<OrderId> {
    let order_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO orders (customer_id, total_amount, status, order_date, special_instructions)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING order_id
        "#,
    )
    .bind(order.customer_id.as_i64())
    .bind(order.total_amount.cents())
    .bind(OrderStatus::Active.as_str())
    .bind(at)
    .bind(&order.special_instructions)
    .fetch_one(&mut *conn)
    .await?;

    let order_id = OrderId::new(order_id);
    insert_items(conn, order_id, &order.items).await?;
    append_status_event(conn, order_id, OrderStatus::Active, at).await?;
    Ok(order_id)
}

/// Replaces an existing order's fields and item set in place and appends a
/// fresh "active" status event. The order row and its ID survive; only the
/// line items are rewritten.
pub async fn replace(
    conn: &mut PgConnection,
    id: OrderId,
    order: &NewOrder,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE orders
        SET customer_id = $1, total_amount = $2, status = $3, order_date = $4, special_instructions = $5
        WHERE order_id = $6
        "#,
    )
    .bind(order.customer_id.as_i64())
    .bind(order.total_amount.cents())
    .bind(OrderStatus::Active.as_str())
    .bind(at)
    .bind(&order.special_instructions)
    .bind(id.as_i64())
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM order_items WHERE order_id = $1")
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    insert_items(conn, id, &order.items).await?;
    append_status_event(conn, id, OrderStatus::Active, at).await?;
    Ok(())
}

/// Marks an order closed and appends the "closed" status event.
pub async fn set_closed(conn: &mut PgConnection, id: OrderId, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE orders SET status = $1 WHERE order_id = $2")
        .bind(OrderStatus::Closed.as_str())
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;

    append_status_event(conn, id, OrderStatus::Closed, at).await?;
    Ok(())
}

/// Fetches an order with its items.
pub async fn fetch(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>> {
    let row = sqlx::query(
        r#"
        SELECT order_id, customer_id, total_amount, status, order_date, special_instructions
        FROM orders
        WHERE order_id = $1
        "#,
    )
    .bind(id.as_i64())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut order = row_to_order(&row)?;
    order.items = items_for(conn, id).await?;
    Ok(Some(order))
}

/// Lists all orders with their items.
pub async fn list(conn: &mut PgConnection) -> Result<Vec<Order>> {
    let rows = sqlx::query(
        r#"
        SELECT order_id, customer_id, total_amount, status, order_date, special_instructions
        FROM orders
        ORDER BY order_id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut order = row_to_order(row)?;
        order.items = items_for(&mut *conn, order.id).await?;
        orders.push(order);
    }
    Ok(orders)
}

/// Returns the line items of an order.
pub async fn items_for(exec: impl PgExecutor<'_>, id: OrderId) -> Result<Vec<OrderItem>> {
    let rows = sqlx::query(
        r#"
        SELECT order_item_id, order_id, menu_item_id, quantity, price_at_order_time, customizations
        FROM order_items
        WHERE order_id = $1
        ORDER BY order_item_id
        "#,
    )
    .bind(id.as_i64())
    .fetch_all(exec)
    .await?;

    rows.iter().map(row_to_item).collect()
}

/// Returns true if an order with the given ID exists.
pub async fn exists(exec: impl PgExecutor<'_>, id: OrderId) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_id = $1)")
            .bind(id.as_i64())
            .fetch_one(exec)
            .await?;
    Ok(exists)
}

/// Hard-deletes an order; its items and status history cascade. Returns
/// false if the order does not exist.
pub async fn delete(exec: impl PgExecutor<'_>, id: OrderId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM orders WHERE order_id = $1")
        .bind(id.as_i64())
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns the append-only status history of an order, oldest first.
pub async fn status_history(exec: impl PgExecutor<'_>, id: OrderId) -> Result<Vec<StatusEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT id, order_id, status, changed_at
        FROM order_status_history
        WHERE order_id = $1
        ORDER BY id
        "#,
    )
    .bind(id.as_i64())
    .fetch_all(exec)
    .await?;

    rows.iter()
        .map(|row| {
            let status: String = row.try_get("status")?;
            Ok(StatusEvent {
                id: row.try_get("id")?,
                order_id: OrderId::new(row.try_get("order_id")?),
                status: parse_status(&status)?,
                changed_at: row.try_get("changed_at")?,
            })
        })
        .collect()
}
