//! PostgreSQL integration tests for the query modules.
//!
//! These tests share one PostgreSQL container; each test truncates the
//! schema, so they are serialized with `#[serial]`.

use std::sync::Arc;

use common::{InventoryId, Money, OrderStatus};
use serial_test::serial;
use sqlx::PgPool;
use store::inventory::{self, NewInventoryItem, NewInventoryTransaction};
use store::orders::{self, NewOrder, NewOrderItem};
use store::{customers, menu};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_schema.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh pool with cleared tables.
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE order_status_history, order_items, orders, menu_price_history, \
         menu_item_ingredients, menu_items, inventory_transactions, inventory, customers \
         RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    pool
}

async fn seed_ingredient(pool: &PgPool, name: &str, stock: f64, reorder: f64) -> InventoryId {
    inventory::insert(
        pool,
        &NewInventoryItem {
            name: name.to_string(),
            stock_level: stock,
            unit_type: "grams".to_string(),
            reorder_level: reorder,
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
#[serial]
async fn restock_inserts_record_and_increments_stock() {
    let pool = get_test_pool().await;
    let flour = seed_ingredient(&pool, "flour", 100.0, 10.0).await;

    let mut tx = pool.begin().await.unwrap();
    let stored = inventory::restock(
        &mut tx,
        &NewInventoryTransaction {
            inventory_id: flour,
            price: Money::from_cents(2599),
            quantity: 25.0,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let item = inventory::fetch(&pool, flour).await.unwrap().unwrap();
    assert_eq!(item.stock_level, 125.0);

    // the transaction record is retrievable unchanged
    let records = inventory::transactions_for(&pool, flour).await.unwrap();
    assert_eq!(records, vec![stored]);
    assert_eq!(records[0].price, Money::from_cents(2599));
    assert_eq!(records[0].quantity, 25.0);
}

#[tokio::test]
#[serial]
async fn restock_rolls_back_with_its_transaction() {
    let pool = get_test_pool().await;
    let flour = seed_ingredient(&pool, "flour", 100.0, 10.0).await;

    let mut tx = pool.begin().await.unwrap();
    inventory::restock(
        &mut tx,
        &NewInventoryTransaction {
            inventory_id: flour,
            price: Money::from_cents(100),
            quantity: 50.0,
        },
    )
    .await
    .unwrap();
    drop(tx); // roll back

    let item = inventory::fetch(&pool, flour).await.unwrap().unwrap();
    assert_eq!(item.stock_level, 100.0);
    assert!(inventory::transactions_for(&pool, flour).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn deduct_decrements_all_guarded_rows() {
    let pool = get_test_pool().await;
    let flour = seed_ingredient(&pool, "flour", 100.0, 10.0).await;
    let milk = seed_ingredient(&pool, "milk", 50.0, 5.0).await;

    let mut tx = pool.begin().await.unwrap();
    let affected = inventory::deduct(&mut tx, &[(flour, 30.0), (milk, 20.0)])
        .await
        .unwrap();
    assert_eq!(affected, 2);
    tx.commit().await.unwrap();

    let levels = inventory::stock_levels(&pool, &[flour, milk]).await.unwrap();
    assert_eq!(levels[&flour], 70.0);
    assert_eq!(levels[&milk], 30.0);
}

#[tokio::test]
#[serial]
async fn deduct_shortfall_reports_partial_count_for_rollback() {
    let pool = get_test_pool().await;
    let flour = seed_ingredient(&pool, "flour", 100.0, 10.0).await;
    let milk = seed_ingredient(&pool, "milk", 5.0, 5.0).await;

    let mut tx = pool.begin().await.unwrap();
    let affected = inventory::deduct(&mut tx, &[(flour, 30.0), (milk, 20.0)])
        .await
        .unwrap();
    // only flour met the guard; the caller must roll back
    assert_eq!(affected, 1);
    drop(tx);

    let levels = inventory::stock_levels(&pool, &[flour, milk]).await.unwrap();
    assert_eq!(levels[&flour], 100.0);
    assert_eq!(levels[&milk], 5.0);
}

#[tokio::test]
#[serial]
async fn stock_levels_omits_unknown_ingredients() {
    let pool = get_test_pool().await;
    let flour = seed_ingredient(&pool, "flour", 10.0, 1.0).await;

    let levels = inventory::stock_levels(&pool, &[flour, InventoryId::new(9999)])
        .await
        .unwrap();
    assert_eq!(levels.len(), 1);
    assert_eq!(levels[&flour], 10.0);
}

#[tokio::test]
#[serial]
async fn reorder_candidates_include_threshold_boundary() {
    let pool = get_test_pool().await;
    let low = seed_ingredient(&pool, "espresso beans", 3.0, 5.0).await;
    let boundary = seed_ingredient(&pool, "cocoa", 5.0, 5.0).await;
    let healthy = seed_ingredient(&pool, "sugar", 50.0, 5.0).await;

    let candidates = inventory::reorder_candidates(&pool).await.unwrap();
    let ids: Vec<InventoryId> = candidates.iter().map(|item| item.id).collect();
    assert!(ids.contains(&low));
    assert!(ids.contains(&boundary)); // stock == threshold still qualifies
    assert!(!ids.contains(&healthy));
}

#[tokio::test]
#[serial]
async fn order_insert_writes_items_and_initial_status_event() {
    let pool = get_test_pool().await;
    let customer = customers::insert(
        &pool,
        &store::customers::NewCustomer {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: String::new(),
        },
    )
    .await
    .unwrap();

    let flour = seed_ingredient(&pool, "flour", 100.0, 10.0).await;
    let mut conn = pool.acquire().await.unwrap();
    let croissant = menu::insert(
        &mut conn,
        &store::menu::NewMenuItem {
            name: "croissant".to_string(),
            description: String::new(),
            price: Money::from_cents(350),
            tags: vec![],
            ingredients: vec![store::menu::NewMenuItemIngredient {
                inventory_id: flour,
                quantity: 60.0,
            }],
        },
    )
    .await
    .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let order_id = orders::insert(
        &mut tx,
        &NewOrder {
            customer_id: customer.id,
            total_amount: Money::from_cents(700),
            special_instructions: serde_json::json!({"note": "warm please"}),
            items: vec![NewOrderItem {
                menu_item_id: croissant.id,
                quantity: 2,
                price_at_order_time: Money::from_cents(700),
                customizations: serde_json::json!({}),
            }],
        },
        chrono::Utc::now(),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let order = {
        let mut conn = pool.acquire().await.unwrap();
        orders::fetch(&mut conn, order_id).await.unwrap().unwrap()
    };
    assert_eq!(order.status, OrderStatus::Active);
    assert_eq!(order.total_amount, Money::from_cents(700));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.special_instructions["note"], "warm please");

    let history = orders::status_history(&pool, order_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, OrderStatus::Active);
}

#[tokio::test]
#[serial]
async fn order_delete_cascades_items_and_history() {
    let pool = get_test_pool().await;
    let customer = customers::insert(
        &pool,
        &store::customers::NewCustomer {
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            phone: String::new(),
        },
    )
    .await
    .unwrap();

    let flour = seed_ingredient(&pool, "flour", 100.0, 10.0).await;
    let mut conn = pool.acquire().await.unwrap();
    let scone = menu::insert(
        &mut conn,
        &store::menu::NewMenuItem {
            name: "scone".to_string(),
            description: String::new(),
            price: Money::from_cents(275),
            tags: vec![],
            ingredients: vec![store::menu::NewMenuItemIngredient {
                inventory_id: flour,
                quantity: 40.0,
            }],
        },
    )
    .await
    .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let order_id = orders::insert(
        &mut tx,
        &NewOrder {
            customer_id: customer.id,
            total_amount: Money::from_cents(275),
            special_instructions: serde_json::json!({}),
            items: vec![NewOrderItem {
                menu_item_id: scone.id,
                quantity: 1,
                price_at_order_time: Money::from_cents(275),
                customizations: serde_json::json!({}),
            }],
        },
        chrono::Utc::now(),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert!(orders::delete(&pool, order_id).await.unwrap());
    assert!(!orders::exists(&pool, order_id).await.unwrap());
    assert!(orders::items_for(&pool, order_id).await.unwrap().is_empty());
    assert!(orders::status_history(&pool, order_id).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn menu_update_appends_price_history_on_change() {
    let pool = get_test_pool().await;
    let flour = seed_ingredient(&pool, "flour", 100.0, 10.0).await;

    let mut conn = pool.acquire().await.unwrap();
    let muffin = menu::insert(
        &mut conn,
        &store::menu::NewMenuItem {
            name: "muffin".to_string(),
            description: String::new(),
            price: Money::from_cents(300),
            tags: vec!["baked".to_string()],
            ingredients: vec![store::menu::NewMenuItemIngredient {
                inventory_id: flour,
                quantity: 80.0,
            }],
        },
    )
    .await
    .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let updated = menu::update(
        &mut tx,
        muffin.id,
        &store::menu::NewMenuItem {
            name: "muffin".to_string(),
            description: "now with more butter".to_string(),
            price: Money::from_cents(350),
            tags: vec!["baked".to_string()],
            ingredients: vec![store::menu::NewMenuItemIngredient {
                inventory_id: flour,
                quantity: 80.0,
            }],
        },
    )
    .await
    .unwrap();
    assert!(updated);
    tx.commit().await.unwrap();

    let history = menu::price_history_for(&pool, muffin.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].old_price, Money::from_cents(300));
    assert_eq!(history[0].new_price, Money::from_cents(350));
}
