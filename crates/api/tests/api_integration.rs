//! Integration tests for the API server against real PostgreSQL.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use tower::ServiceExt;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

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

async fn setup() -> axum::Router {
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

    let state = api::create_state(pool);
    api::create_app(state, get_metrics_handle())
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Seeds a customer, two ingredients, and a latte; returns
/// (customer_id, menu_item_id, syrup_inventory_id).
async fn seed_shop(app: &axum::Router) -> (i64, i64, i64) {
    let (status, customer) = send(
        app,
        "POST",
        "/customers",
        Some(serde_json::json!({"name": "Alice", "email": "alice@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, beans) = send(
        app,
        "POST",
        "/inventory",
        Some(serde_json::json!({
            "name": "espresso beans",
            "stock_level": 500.0,
            "unit_type": "grams",
            "reorder_level": 50.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, syrup) = send(
        app,
        "POST",
        "/inventory",
        Some(serde_json::json!({
            "name": "vanilla syrup",
            "stock_level": 40.0,
            "unit_type": "ml",
            "reorder_level": 20.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, latte) = send(
        app,
        "POST",
        "/menu",
        Some(serde_json::json!({
            "name": "vanilla latte",
            "description": "espresso with vanilla",
            "price": 550,
            "tags": ["coffee"],
            "ingredients": [
                {"inventory_id": beans["id"], "quantity": 18.0},
                {"inventory_id": syrup["id"], "quantity": 25.0}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        customer["id"].as_i64().unwrap(),
        latte["id"].as_i64().unwrap(),
        syrup["id"].as_i64().unwrap(),
    )
}

#[tokio::test]
#[serial]
async fn test_health_check() {
    let app = setup().await;

    let (status, json) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
#[serial]
async fn test_order_lifecycle_over_http() {
    let app = setup().await;
    let (customer_id, latte_id, syrup_id) = seed_shop(&app).await;

    // two lattes need 50ml of syrup; restock past the seeded 40ml first
    let (status, _) = send(
        &app,
        "POST",
        "/inventory-transactions",
        Some(serde_json::json!({
            "inventory_id": syrup_id,
            "price": 1500,
            "quantity": 60.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, order) = send(
        &app,
        "POST",
        "/orders",
        Some(serde_json::json!({
            "customer_id": customer_id,
            "special_instructions": {"note": "oat milk"},
            "items": [{"menu_item_id": latte_id, "quantity": 2}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "active");
    assert_eq!(order["total_amount"], 1100);
    assert_eq!(order["special_instructions"]["note"], "oat milk");

    let order_id = order["id"].as_i64().unwrap();

    let (status, body) = send(&app, "POST", &format!("/orders/{order_id}/close"), None).await;
    assert_eq!(status, StatusCode::OK);
    // 100 - 50 = 50ml of syrup left, above its 20ml threshold: no alert
    assert_eq!(body, serde_json::Value::Null);

    let (status, closed) = send(&app, "GET", &format!("/orders/{order_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(closed["status"], "closed");

    // second close conflicts
    let (status, body) = send(&app, "POST", &format!("/orders/{order_id}/close"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already closed"));

    let (status, history) = send(&app, "GET", &format!("/orders/{order_id}/history"), None).await;
    assert_eq!(status, StatusCode::OK);
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|event| event["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["active", "closed"]);
}

#[tokio::test]
#[serial]
async fn test_close_reports_reorder_candidates() {
    let app = setup().await;
    let (customer_id, latte_id, syrup_id) = seed_shop(&app).await;

    // one latte leaves 40 - 25 = 15ml of syrup, at/below its 20ml threshold
    let (status, order) = send(
        &app,
        "POST",
        "/orders",
        Some(serde_json::json!({
            "customer_id": customer_id,
            "items": [{"menu_item_id": latte_id, "quantity": 1}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["id"].as_i64().unwrap();

    let (status, alert) = send(&app, "POST", &format!("/orders/{order_id}/close"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alert["comment"], "these items need to be replenished");
    let flagged: Vec<i64> = alert["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect();
    assert!(flagged.contains(&syrup_id));
}

#[tokio::test]
#[serial]
async fn test_order_validation_and_not_found_mapping() {
    let app = setup().await;
    let (customer_id, latte_id, _) = seed_shop(&app).await;

    // empty items: field validation rejects before the engine runs
    let (status, body) = send(
        &app,
        "POST",
        "/orders",
        Some(serde_json::json!({"customer_id": customer_id, "items": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("items"));

    // unknown menu reference
    let (status, body) = send(
        &app,
        "POST",
        "/orders",
        Some(serde_json::json!({
            "customer_id": customer_id,
            "items": [{"menu_item_id": 9999, "quantity": 1}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("does not exist"));

    // unknown customer
    let (status, _) = send(
        &app,
        "POST",
        "/orders",
        Some(serde_json::json!({
            "customer_id": 424242,
            "items": [{"menu_item_id": latte_id, "quantity": 1}]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/orders/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/orders/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[serial]
async fn test_batch_process_contract() {
    let app = setup().await;
    let (customer_id, latte_id, _) = seed_shop(&app).await;

    let (status, report) = send(
        &app,
        "POST",
        "/orders/batch-process",
        Some(serde_json::json!({
            "orders": [
                {"customer_id": customer_id, "items": [{"menu_item_id": latte_id, "quantity": 1}]},
                {"customer_id": customer_id, "items": []},
                {"customer_id": customer_id, "items": [{"menu_item_id": 9999, "quantity": 1}]}
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let summary = &report["summary"];
    assert_eq!(summary["total_orders"], 3);
    assert_eq!(summary["accepted"], 1);
    assert_eq!(summary["rejected"], 2);
    assert_eq!(summary["total_revenue"], 550);

    let processed = report["processed_orders"].as_array().unwrap();
    assert_eq!(processed.len(), 3);
    assert_eq!(processed[0]["status"], "accepted");
    assert!(processed[0]["order_id"].is_i64());
    assert!(processed[0].get("reason").is_none());
    assert_eq!(processed[1]["status"], "rejected");
    assert!(processed[1]["reason"].as_str().unwrap().contains("items are empty"));
    assert_eq!(processed[2]["status"], "rejected");

    // the accepted order landed closed, with its stock effects committed
    let updates = summary["inventory_updates"].as_array().unwrap();
    assert_eq!(updates.len(), 2); // beans and syrup, one touch point each
    for update in updates {
        assert!(update["quantity_used"].as_f64().unwrap() > 0.0);
        assert!(update["remaining"].as_f64().unwrap() >= 0.0);
    }
}

#[tokio::test]
#[serial]
async fn test_customer_and_inventory_crud() {
    let app = setup().await;

    let (status, customer) = send(
        &app,
        "POST",
        "/customers",
        Some(serde_json::json!({"name": "Bob", "email": "bob@example.com", "phone": "555-0100"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let customer_id = customer["id"].as_i64().unwrap();

    // duplicate email is rejected
    let (status, _) = send(
        &app,
        "POST",
        "/customers",
        Some(serde_json::json!({"name": "Bobby", "email": "bob@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/customers/{customer_id}"),
        Some(serde_json::json!({"name": "Robert", "email": "bob@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Robert");

    let (status, _) = send(&app, "DELETE", &format!("/customers/{customer_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/customers/{customer_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // inventory name uniqueness
    let (status, _) = send(
        &app,
        "POST",
        "/inventory",
        Some(serde_json::json!({
            "name": "flour", "stock_level": 10.0, "unit_type": "grams", "reorder_level": 2.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(
        &app,
        "POST",
        "/inventory",
        Some(serde_json::json!({
            "name": "flour", "stock_level": 5.0, "unit_type": "grams", "reorder_level": 1.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
#[serial]
async fn test_metrics_endpoint() {
    let app = setup().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
