use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
};
use crate::{
    auth::AuthenticatedUser,
    entities::stock_movement::MovementType,
    errors::ApiError,
    services::inventory::{
        AdjustmentInput, MovementFilter, StockInInput, StockOutInput, SummaryFilter,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Query, State},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

// Request and response DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct StockInRequest {
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    #[validate(length(max = 100))]
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct StockOutRequest {
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    #[validate(length(max = 100))]
    pub reference_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdjustmentRequest {
    pub branch_id: Uuid,
    pub product_id: Uuid,
    pub new_quantity: Decimal,
    #[validate(length(min = 1, max = 255))]
    pub reason: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementListQuery {
    pub branch_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    /// One of: in, out, adjustment, sale, return
    pub movement_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Matches against the reference number
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// Only products at or below their minimum stock level
    #[serde(default)]
    pub low_stock: bool,
    /// Matches against product name or SKU
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

/// List stock movements
#[utoipa::path(
    get,
    path = "/api/v1/inventory/movements",
    params(MovementListQuery),
    responses(
        (status = 200, description = "Stock movements fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<MovementListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let movement_type = query
        .movement_type
        .as_deref()
        .map(|s| {
            s.parse::<MovementType>()
                .map_err(|_| ApiError::ValidationError(format!("Unknown movement type: {}", s)))
        })
        .transpose()?;

    let (items, total) = state
        .services
        .inventory
        .list_movements(
            user.tenant_id,
            MovementFilter {
                branch_id: query.branch_id,
                product_id: query.product_id,
                movement_type,
                start_date: query.start_date,
                end_date: query.end_date,
                search: query.search,
                page: query.page,
                per_page: query.per_page,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(
        PaginatedResponse::new(items, query.page, query.per_page, total),
    )))
}

/// Add stock to a product
#[utoipa::path(
    post,
    path = "/api/v1/inventory/stock-in",
    request_body = StockInRequest,
    responses(
        (status = 201, description = "Stock added", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn stock_in(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<StockInRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let receipt = state
        .services
        .inventory
        .stock_in(
            user.tenant_id,
            user.user_id,
            StockInInput {
                branch_id: payload.branch_id,
                product_id: payload.product_id,
                quantity: payload.quantity,
                unit_cost: payload.unit_cost,
                reference_number: payload.reference_number,
                notes: payload.notes,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        receipt.movement,
        "Stock added successfully",
    )))
}

/// Remove stock from a product
#[utoipa::path(
    post,
    path = "/api/v1/inventory/stock-out",
    request_body = StockOutRequest,
    responses(
        (status = 201, description = "Stock removed", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn stock_out(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<StockOutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let receipt = state
        .services
        .inventory
        .stock_out(
            user.tenant_id,
            user.user_id,
            StockOutInput {
                branch_id: payload.branch_id,
                product_id: payload.product_id,
                quantity: payload.quantity,
                reference_number: payload.reference_number,
                notes: payload.notes,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        receipt.movement,
        "Stock removed successfully",
    )))
}

/// Adjust stock to an exact counted value
#[utoipa::path(
    post,
    path = "/api/v1/inventory/adjustment",
    request_body = AdjustmentRequest,
    responses(
        (status = 201, description = "Stock adjusted", body = crate::ApiResponse<serde_json::Value>),
        (status = 200, description = "Stock already at the requested quantity", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjustment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AdjustmentRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .inventory
        .adjust(
            user.tenant_id,
            user.user_id,
            AdjustmentInput {
                branch_id: payload.branch_id,
                product_id: payload.product_id,
                new_quantity: payload.new_quantity,
                reason: payload.reason,
                notes: payload.notes,
            },
        )
        .await
        .map_err(map_service_error)?;

    let response = if outcome.movement.is_some() {
        created_response(ApiResponse::with_message(
            outcome,
            "Stock adjusted successfully",
        ))
    } else {
        success_response(ApiResponse::with_message(
            outcome,
            "Stock already at the requested quantity",
        ))
    };
    Ok(response)
}

/// Per-product stock summary
#[utoipa::path(
    get,
    path = "/api/v1/inventory/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Stock summary fetched", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "inventory"
)]
pub async fn stock_summary(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<SummaryQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (rows, total) = state
        .services
        .inventory
        .stock_summary(
            user.tenant_id,
            SummaryFilter {
                low_stock: query.low_stock,
                search: query.search,
                page: query.page,
                per_page: query.per_page,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(
        PaginatedResponse::new(rows, query.page, query.per_page, total),
    )))
}

/// Creates the router for inventory endpoints
pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/movements", get(list_movements))
        .route("/stock-in", post(stock_in))
        .route("/stock-out", post(stock_out))
        .route("/adjustment", post(adjustment))
        .route("/summary", get(stock_summary))
}
