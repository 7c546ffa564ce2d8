mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use bengkelpos_api::{app_router, auth::AuthConfig, config::AppConfig, AppState};
use common::{dec, reload_product, seed_product, setup, TestCtx};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

const TEST_SECRET_LEN: usize = 64;

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "a".repeat(TEST_SECRET_LEN),
        jwt_expiration: 3600,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        log_json: false,
        auto_migrate: false,
        cors_allowed_origins: None,
        db_max_connections: 1,
        db_min_connections: 1,
        event_queue_capacity: 100,
    }
}

fn test_app(ctx: &TestCtx) -> (Router, String) {
    let config = test_config();
    let auth = AuthConfig::new(config.jwt_secret.clone(), config.jwt_expiration as i64);
    let token = auth
        .generate_token(ctx.user_id, ctx.tenant_id)
        .expect("sign token");

    let state = AppState::new(ctx.db.clone(), config, ctx.events.clone());
    (app_router(state), token)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json body")
}

/// Decimals serialize as strings; parse them so trailing zeros from the
/// database round trip do not matter.
fn decimal_field(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal field is a string")
        .parse()
        .expect("decimal field parses")
}

#[tokio::test]
async fn health_is_public() {
    let ctx = setup().await;
    let (app, _token) = test_app(&ctx);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("healthy"));
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let ctx = setup().await;
    let (app, _token) = test_app(&ctx);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/inventory/movements")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn garbage_tokens_are_rejected() {
    let ctx = setup().await;
    let (app, _token) = test_app(&ctx);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/inventory/movements")
                .header("Authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stock_in_end_to_end() {
    let ctx = setup().await;
    let product = seed_product(&ctx, "OLI-001", "Engine Oil 1L", dec(50)).await;
    let (app, token) = test_app(&ctx);

    let payload = json!({
        "branch_id": ctx.branch_id,
        "product_id": product.id,
        "quantity": "20",
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/inventory/stock-in")
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(decimal_field(&body["data"]["quantity_before"]), dec(50));
    assert_eq!(decimal_field(&body["data"]["quantity_after"]), dec(70));
    assert_eq!(reload_product(&ctx, product.id).await.stock, dec(70));
}

#[tokio::test]
async fn insufficient_stock_maps_to_422() {
    let ctx = setup().await;
    let product = seed_product(&ctx, "FLT-001", "Oil Filter", dec(3)).await;
    let (app, token) = test_app(&ctx);

    let payload = json!({
        "branch_id": ctx.branch_id,
        "product_id": product.id,
        "quantity": "10",
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/inventory/stock-out")
                .header("Authorization", format!("Bearer {token}"))
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["message"]
        .as_str()
        .expect("message present")
        .contains("Insufficient stock"));
}

#[tokio::test]
async fn unknown_movement_type_maps_to_400() {
    let ctx = setup().await;
    let (app, token) = test_app(&ctx);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/inventory/movements?movement_type=sideways")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tokens_are_tenant_scoped() {
    let ctx = setup().await;
    let product = seed_product(&ctx, "OLI-002", "Gear Oil", dec(10)).await;
    let (app, _token) = test_app(&ctx);

    // A valid token for a different tenant cannot touch this tenant's rows.
    let config = test_config();
    let auth = AuthConfig::new(config.jwt_secret.clone(), 3600);
    let foreign_token = auth
        .generate_token(uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
        .expect("sign token");

    let payload = json!({
        "branch_id": ctx.branch_id,
        "product_id": product.id,
        "quantity": "5",
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/inventory/stock-in")
                .header("Authorization", format!("Bearer {foreign_token}"))
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .expect("build request"),
        )
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(reload_product(&ctx, product.id).await.stock, dec(10));
}
