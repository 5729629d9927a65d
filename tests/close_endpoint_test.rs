use axum::http::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use strikebook::api::{self, AppState};
use strikebook::db::init_db;
use strikebook::pricing::MockPriceSource;
use strikebook::{Config, LifecycleManager, MarginLedger, Repository};
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    _temp: TempDir,
}

fn test_config() -> Config {
    let mut env = HashMap::new();
    env.insert("DATABASE_PATH".to_string(), ":memory:".to_string());
    Config::from_env_map(env).unwrap()
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let config = test_config();
    let repo = Arc::new(Repository::new(pool));
    let ledger = Arc::new(MarginLedger::new(repo.clone(), config.close_retry_limit));
    let lifecycle = Arc::new(LifecycleManager::new(
        repo.clone(),
        ledger.clone(),
        config.close_retry_limit,
    ));
    let state = AppState::new(
        repo,
        lifecycle,
        ledger,
        Arc::new(MockPriceSource::new()),
        config,
    );
    let app = api::create_router(state);

    TestApp {
        app,
        _temp: temp_dir,
    }
}

async fn request_json(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            axum::body::Body::from(json.to_string())
        }
        None => axum::body::Body::empty(),
    };

    let res = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn open_body(quantity: i64, price: &str) -> serde_json::Value {
    serde_json::json!({
        "ticker": "PETR4",
        "kind": "CALL",
        "direction": "BUY",
        "strike": 34.5,
        "price": price.parse::<f64>().unwrap(),
        "quantity": quantity,
        "referenceMonth": 4,
        "referenceYear": 2024
    })
}

async fn open_position(app: &axum::Router, quantity: i64, price: &str) -> String {
    let (status, body) = request_json(
        app.clone(),
        "POST",
        "/positions?user=trader-1",
        Some(open_body(quantity, price)),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "open failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_open_returns_operation() {
    let test_app = setup_test_app().await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "POST",
        "/positions?user=trader-1",
        Some(open_body(100, "2.00")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Open");
    assert_eq!(body["quantity"], 100);
    assert_eq!(body["remainingQuantity"], 100);
    assert_eq!(body["openNotional"], 200.0);
    assert_eq!(body["visualId"], "PETR4 CALL 34.5 Abr/24");
}

#[tokio::test]
async fn test_full_close_returns_parent_without_child() {
    let test_app = setup_test_app().await;
    let id = open_position(&test_app.app, 100, "2.00").await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "POST",
        &format!("/positions/{}/close?user=trader-1", id),
        Some(serde_json::json!({"closePrice": 2.50})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parent"]["status"], "Closed");
    assert_eq!(body["parent"]["result"], 50.0);
    assert!(body.get("realizedChild").is_none());
}

#[tokio::test]
async fn test_partial_close_returns_parent_and_child() {
    let test_app = setup_test_app().await;
    let id = open_position(&test_app.app, 100, "2.00").await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "POST",
        &format!("/positions/{}/close?user=trader-1", id),
        Some(serde_json::json!({"closePrice": 3.00, "quantityToClose": 40})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parent"]["status"], "PartiallyClosed");
    assert_eq!(body["parent"]["remainingQuantity"], 60);
    assert_eq!(body["realizedChild"]["status"], "Closed");
    assert_eq!(body["realizedChild"]["quantity"], 40);
    assert_eq!(body["realizedChild"]["result"], 40.0);
    assert_eq!(body["realizedChild"]["originalOperationId"], body["parent"]["id"]);
}

#[tokio::test]
async fn test_close_more_than_remaining_is_invalid_quantity() {
    let test_app = setup_test_app().await;
    let id = open_position(&test_app.app, 100, "2.00").await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "POST",
        &format!("/positions/{}/close?user=trader-1", id),
        Some(serde_json::json!({"closePrice": 3.00, "quantityToClose": 101})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "InvalidQuantity");
}

#[tokio::test]
async fn test_close_nonpositive_price_is_invalid_price() {
    let test_app = setup_test_app().await;
    let id = open_position(&test_app.app, 100, "2.00").await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "POST",
        &format!("/positions/{}/close?user=trader-1", id),
        Some(serde_json::json!({"closePrice": 0})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "InvalidPrice");
}

#[tokio::test]
async fn test_close_unknown_operation_is_not_found() {
    let test_app = setup_test_app().await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "POST",
        "/positions/00000000-0000-0000-0000-000000000000/close?user=trader-1",
        Some(serde_json::json!({"closePrice": 2.50})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NotFound");
}

#[tokio::test]
async fn test_close_foreign_operation_is_forbidden() {
    let test_app = setup_test_app().await;
    let id = open_position(&test_app.app, 100, "2.00").await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "POST",
        &format!("/positions/{}/close?user=trader-2", id),
        Some(serde_json::json!({"closePrice": 2.50})),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "Forbidden");
}

#[tokio::test]
async fn test_list_positions_shows_active_only() {
    let test_app = setup_test_app().await;
    let keep = open_position(&test_app.app, 100, "2.00").await;
    let closed = open_position(&test_app.app, 50, "1.00").await;

    request_json(
        test_app.app.clone(),
        "POST",
        &format!("/positions/{}/close?user=trader-1", closed),
        Some(serde_json::json!({"closePrice": 1.50})),
    )
    .await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "GET",
        "/positions?user=trader-1",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let positions = body["positions"].as_array().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0]["id"], keep.as_str());
}

#[tokio::test]
async fn test_delete_cascades_children() {
    let test_app = setup_test_app().await;
    let id = open_position(&test_app.app, 100, "2.00").await;

    request_json(
        test_app.app.clone(),
        "POST",
        &format!("/positions/{}/close?user=trader-1", id),
        Some(serde_json::json!({"closePrice": 3.00, "quantityToClose": 40})),
    )
    .await;

    let (status, _) = request_json(
        test_app.app.clone(),
        "DELETE",
        &format!("/positions/{}?user=trader-1", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request_json(
        test_app.app.clone(),
        "GET",
        "/reports?user=trader-1&period=all",
        None,
    )
    .await;
    assert_eq!(body["totalOperacoes"], 0);
}
