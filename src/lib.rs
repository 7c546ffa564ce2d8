pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{middleware, routing::get, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use handlers::{
    inventory::inventory_routes, purchase_orders::purchase_order_routes, sales::sale_routes,
    stock_opname::stock_opname_routes,
};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<db::DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub auth: auth::AuthConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<db::DbPool>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
    ) -> Self {
        let auth = auth::AuthConfig::new(
            config.jwt_secret.clone(),
            config.jwt_expiration as i64,
        );
        let services = handlers::AppServices::new(db.clone(), event_sender.clone());

        Self {
            db,
            config,
            event_sender,
            auth,
            services,
        }
    }
}

// Common response envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

async fn health_check() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Builds the full application router. Every `/api/v1` route requires a
/// valid bearer token; `/health` and the API docs do not.
pub fn app_router(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/inventory", inventory_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/stock-opnames", stock_opname_routes())
        .nest("/sales", sale_routes())
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(openapi::swagger_ui())
        .nest("/api/v1", protected)
        .with_state(state)
}
