//! Menu items, their recipes, and price history.

use chrono::{DateTime, Utc};
use common::{InventoryId, MenuItemId, Money};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, Row, postgres::PgRow};

use crate::Result;

/// A sellable menu item with its recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub tags: Vec<String>,
    pub ingredients: Vec<MenuItemIngredient>,
}

/// One recipe edge: how much of an ingredient one unit of the item consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItemIngredient {
    pub id: i64,
    pub menu_item_id: MenuItemId,
    pub inventory_id: InventoryId,
    pub quantity: f64,
}

/// Fields for creating or updating a menu item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMenuItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub tags: Vec<String>,
    pub ingredients: Vec<NewMenuItemIngredient>,
}

/// A recipe edge for a new or updated menu item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMenuItemIngredient {
    pub inventory_id: InventoryId,
    pub quantity: f64,
}

/// A recorded price change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub id: i64,
    pub menu_item_id: MenuItemId,
    pub old_price: Money,
    pub new_price: Money,
    pub changed_at: DateTime<Utc>,
}

fn row_to_item(row: &PgRow) -> Result<MenuItem> {
    Ok(MenuItem {
        id: MenuItemId::new(row.try_get("menu_item_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price")?),
        tags: row.try_get("tags")?,
        ingredients: Vec::new(),
    })
}

fn row_to_ingredient(row: &PgRow) -> Result<MenuItemIngredient> {
    Ok(MenuItemIngredient {
        id: row.try_get("id")?,
        menu_item_id: MenuItemId::new(row.try_get("menu_item_id")?),
        inventory_id: InventoryId::new(row.try_get("inventory_id")?),
        quantity: row.try_get("quantity")?,
    })
}

fn row_to_history(row: &PgRow) -> Result<PriceHistoryEntry> {
    Ok(PriceHistoryEntry {
        id: row.try_get("id")?,
        menu_item_id: MenuItemId::new(row.try_get("menu_item_id")?),
        old_price: Money::from_cents(row.try_get("old_price")?),
        new_price: Money::from_cents(row.try_get("new_price")?),
        changed_at: row.try_get("changed_at")?,
    })
}

async fn insert_ingredients(
    conn: &mut PgConnection,
    id: MenuItemId,
    ingredients: &[NewMenuItemIngredient],
) -> Result<()> {
    for edge in ingredients {
        sqlx::query(
            "INSERT INTO menu_item_ingredients (menu_item_id, inventory_id, quantity) VALUES ($1, $2, $3)",
        )
        .bind(id.as_i64())
        .bind(edge.inventory_id.as_i64())
        .bind(edge.quantity)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Inserts a menu item with its recipe edges inside the caller's transaction.
pub async fn insert(conn: &mut PgConnection, item: &NewMenuItem) -> Result<MenuItem> {
    let row = sqlx::query(
        r#"
        INSERT INTO menu_items (name, description, price, tags)
        VALUES ($1, $2, $3, $4)
        RETURNING menu_item_id, name, description, price, tags
        "#,
    )
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.price.cents())
    .bind(&item.tags)
    .fetch_one(&mut *conn)
    .await?;

    let mut stored = row_to_item(&row)?;
    insert_ingredients(conn, stored.id, &item.ingredients).await?;
    stored.ingredients = ingredients_for(&mut *conn, stored.id).await?;
    Ok(stored)
}

/// Updates a menu item in place, replacing its recipe and appending a price
/// history row when the price changed. Returns false if the item is absent.
pub async fn update(conn: &mut PgConnection, id: MenuItemId, item: &NewMenuItem) -> Result<bool> {
    let old_price: Option<i64> =
        sqlx::query_scalar("SELECT price FROM menu_items WHERE menu_item_id = $1")
            .bind(id.as_i64())
            .fetch_optional(&mut *conn)
            .await?;

    let Some(old_price) = old_price else {
        return Ok(false);
    };

    sqlx::query(
        r#"
        UPDATE menu_items
        SET name = $1, description = $2, price = $3, tags = $4
        WHERE menu_item_id = $5
        "#,
    )
    .bind(&item.name)
    .bind(&item.description)
    .bind(item.price.cents())
    .bind(&item.tags)
    .bind(id.as_i64())
    .execute(&mut *conn)
    .await?;

    if old_price != item.price.cents() {
        sqlx::query(
            "INSERT INTO menu_price_history (menu_item_id, old_price, new_price) VALUES ($1, $2, $3)",
        )
        .bind(id.as_i64())
        .bind(old_price)
        .bind(item.price.cents())
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query("DELETE FROM menu_item_ingredients WHERE menu_item_id = $1")
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    insert_ingredients(conn, id, &item.ingredients).await?;

    Ok(true)
}

/// Deletes a menu item. Returns false if the item does not exist.
pub async fn delete(exec: impl PgExecutor<'_>, id: MenuItemId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM menu_items WHERE menu_item_id = $1")
        .bind(id.as_i64())
        .execute(exec)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetches a menu item with its recipe edges.
pub async fn fetch(conn: &mut PgConnection, id: MenuItemId) -> Result<Option<MenuItem>> {
    let row = sqlx::query(
        "SELECT menu_item_id, name, description, price, tags FROM menu_items WHERE menu_item_id = $1",
    )
    .bind(id.as_i64())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut item = row_to_item(&row)?;
    item.ingredients = ingredients_for(conn, id).await?;
    Ok(Some(item))
}

/// Lists all menu items with their recipe edges.
pub async fn list(conn: &mut PgConnection) -> Result<Vec<MenuItem>> {
    let rows = sqlx::query(
        "SELECT menu_item_id, name, description, price, tags FROM menu_items ORDER BY menu_item_id",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut item = row_to_item(row)?;
        item.ingredients = ingredients_for(&mut *conn, item.id).await?;
        items.push(item);
    }
    Ok(items)
}

/// Returns true if a menu item with the given ID exists.
pub async fn exists(exec: impl PgExecutor<'_>, id: MenuItemId) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM menu_items WHERE menu_item_id = $1)")
            .bind(id.as_i64())
            .fetch_one(exec)
            .await?;
    Ok(exists)
}

/// Returns true if a menu item already uses the given name.
pub async fn name_taken(exec: impl PgExecutor<'_>, name: &str) -> Result<bool> {
    let taken: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM menu_items WHERE name = $1)")
            .bind(name)
            .fetch_one(exec)
            .await?;
    Ok(taken)
}

/// Returns the current unit price of a menu item, if it exists.
pub async fn price_of(exec: impl PgExecutor<'_>, id: MenuItemId) -> Result<Option<Money>> {
    let price: Option<i64> =
        sqlx::query_scalar("SELECT price FROM menu_items WHERE menu_item_id = $1")
            .bind(id.as_i64())
            .fetch_optional(exec)
            .await?;
    Ok(price.map(Money::from_cents))
}

/// Returns the recipe edges for a menu item.
pub async fn ingredients_for(
    exec: impl PgExecutor<'_>,
    id: MenuItemId,
) -> Result<Vec<MenuItemIngredient>> {
    let rows = sqlx::query(
        r#"
        SELECT id, menu_item_id, inventory_id, quantity
        FROM menu_item_ingredients
        WHERE menu_item_id = $1
        ORDER BY id
        "#,
    )
    .bind(id.as_i64())
    .fetch_all(exec)
    .await?;

    rows.iter().map(row_to_ingredient).collect()
}

/// Lists all recorded price changes.
pub async fn price_history(exec: impl PgExecutor<'_>) -> Result<Vec<PriceHistoryEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, menu_item_id, old_price, new_price, changed_at
        FROM menu_price_history
        ORDER BY id
        "#,
    )
    .fetch_all(exec)
    .await?;

    rows.iter().map(row_to_history).collect()
}

/// Lists recorded price changes for one menu item.
pub async fn price_history_for(
    exec: impl PgExecutor<'_>,
    id: MenuItemId,
) -> Result<Vec<PriceHistoryEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, menu_item_id, old_price, new_price, changed_at
        FROM menu_price_history
        WHERE menu_item_id = $1
        ORDER BY id
        "#,
    )
    .bind(id.as_i64())
    .fetch_all(exec)
    .await?;

    rows.iter().map(row_to_history).collect()
}
