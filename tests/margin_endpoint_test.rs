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

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let mut env = HashMap::new();
    env.insert("DATABASE_PATH".to_string(), db_path);
    let config = Config::from_env_map(env).unwrap();

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

#[tokio::test]
async fn test_fresh_account_is_zeroed() {
    let test_app = setup_test_app().await;

    let (status, body) =
        request_json(test_app.app.clone(), "GET", "/margin?user=trader-1", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["total"], 0.0);
    assert_eq!(body["account"]["allocated"], 0.0);
    assert_eq!(body["account"]["available"], 0.0);
    assert!(body["adjustments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_set_total_and_history() {
    let test_app = setup_test_app().await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "PUT",
        "/margin/total?user=trader-1",
        Some(serde_json::json!({"total": 1000, "note": "initial funding"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1000.0);
    assert_eq!(body["available"], 1000.0);

    let (_, body) =
        request_json(test_app.app.clone(), "GET", "/margin?user=trader-1", None).await;
    let adjustments = body["adjustments"].as_array().unwrap();
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0]["delta"], 1000.0);
    assert_eq!(adjustments[0]["kind"], "set_total");
    assert_eq!(adjustments[0]["note"], "initial funding");
}

#[tokio::test]
async fn test_open_with_margin_updates_available() {
    let test_app = setup_test_app().await;

    request_json(
        test_app.app.clone(),
        "PUT",
        "/margin/total?user=trader-1",
        Some(serde_json::json!({"total": 1000})),
    )
    .await;

    let (status, _) = request_json(
        test_app.app.clone(),
        "POST",
        "/positions?user=trader-1",
        Some(serde_json::json!({
            "ticker": "PETR4", "kind": "CALL", "direction": "BUY",
            "strike": 34.5, "price": 2.00, "quantity": 100,
            "margin": 400,
            "referenceMonth": 4, "referenceYear": 2024
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) =
        request_json(test_app.app.clone(), "GET", "/margin?user=trader-1", None).await;
    assert_eq!(body["account"]["allocated"], 400.0);
    assert_eq!(body["account"]["available"], 600.0);
}

#[tokio::test]
async fn test_open_beyond_available_is_insufficient_margin() {
    let test_app = setup_test_app().await;

    request_json(
        test_app.app.clone(),
        "PUT",
        "/margin/total?user=trader-1",
        Some(serde_json::json!({"total": 100})),
    )
    .await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "POST",
        "/positions?user=trader-1",
        Some(serde_json::json!({
            "ticker": "PETR4", "kind": "CALL", "direction": "BUY",
            "strike": 34.5, "price": 2.00, "quantity": 100,
            "margin": 500,
            "referenceMonth": 4, "referenceYear": 2024
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "InsufficientMargin");

    // The failed open left nothing behind.
    let (_, positions) = request_json(
        test_app.app.clone(),
        "GET",
        "/positions?user=trader-1",
        None,
    )
    .await;
    assert!(positions["positions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_set_total_below_allocated_is_rejected() {
    let test_app = setup_test_app().await;

    request_json(
        test_app.app.clone(),
        "PUT",
        "/margin/total?user=trader-1",
        Some(serde_json::json!({"total": 1000})),
    )
    .await;
    request_json(
        test_app.app.clone(),
        "POST",
        "/positions?user=trader-1",
        Some(serde_json::json!({
            "ticker": "PETR4", "kind": "CALL", "direction": "BUY",
            "strike": 34.5, "price": 2.00, "quantity": 100,
            "margin": 400,
            "referenceMonth": 4, "referenceYear": 2024
        })),
    )
    .await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "PUT",
        "/margin/total?user=trader-1",
        Some(serde_json::json!({"total": 300})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "MarginBelowAllocated");

    let (_, margin) =
        request_json(test_app.app.clone(), "GET", "/margin?user=trader-1", None).await;
    assert_eq!(margin["account"]["total"], 1000.0);
}

#[tokio::test]
async fn test_manual_adjustment() {
    let test_app = setup_test_app().await;

    request_json(
        test_app.app.clone(),
        "PUT",
        "/margin/total?user=trader-1",
        Some(serde_json::json!({"total": 1000})),
    )
    .await;

    let (status, body) = request_json(
        test_app.app.clone(),
        "POST",
        "/margin/adjust?user=trader-1",
        Some(serde_json::json!({"delta": -250, "note": "withdrawal"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 750.0);

    let (_, margin) =
        request_json(test_app.app.clone(), "GET", "/margin?user=trader-1", None).await;
    let adjustments = margin["adjustments"].as_array().unwrap();
    assert_eq!(adjustments.len(), 2);
    // Newest first.
    assert_eq!(adjustments[0]["kind"], "manual");
    assert_eq!(adjustments[0]["delta"], -250.0);
}

#[tokio::test]
async fn test_margin_accounts_are_per_user() {
    let test_app = setup_test_app().await;

    request_json(
        test_app.app.clone(),
        "PUT",
        "/margin/total?user=trader-1",
        Some(serde_json::json!({"total": 1000})),
    )
    .await;

    let (_, other) =
        request_json(test_app.app.clone(), "GET", "/margin?user=trader-2", None).await;
    assert_eq!(other["account"]["total"], 0.0);
}
