use super::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
};
use crate::{
    auth::AuthenticatedUser,
    entities::sale::PaymentMethod,
    errors::ApiError,
    services::sales::{CreateSaleInput, SaleFilter, SaleItemInput},
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::get,
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
pub struct SaleItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSaleRequest {
    pub branch_id: Uuid,
    pub customer_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub items: Vec<SaleItemRequest>,
    /// One of: cash, transfer, card, qris
    pub payment_method: String,
    pub discount_percent: Option<Decimal>,
    pub tax_percent: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SaleListQuery {
    pub branch_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Matches against the invoice number
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

/// List sales
#[utoipa::path(
    get,
    path = "/api/v1/sales",
    params(SaleListQuery),
    responses(
        (status = 200, description = "Sales fetched", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<SaleListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (items, total) = state
        .services
        .sales
        .list(
            user.tenant_id,
            SaleFilter {
                branch_id: query.branch_id,
                customer_id: query.customer_id,
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

/// Create a sale transaction
#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = CreateSaleRequest,
    responses(
        (status = 201, description = "Sale created", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let payment_method = payload.payment_method.parse::<PaymentMethod>().map_err(|_| {
        ApiError::ValidationError(format!(
            "Unknown payment method: {}",
            payload.payment_method
        ))
    })?;

    let detail = state
        .services
        .sales
        .create_sale(
            user.tenant_id,
            user.user_id,
            CreateSaleInput {
                branch_id: payload.branch_id,
                customer_id: payload.customer_id,
                vehicle_id: payload.vehicle_id,
                items: payload
                    .items
                    .into_iter()
                    .map(|item| SaleItemInput {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                    })
                    .collect(),
                payment_method,
                discount_percent: payload.discount_percent.unwrap_or(Decimal::ZERO),
                tax_percent: payload.tax_percent.unwrap_or(Decimal::ZERO),
                notes: payload.notes,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        detail,
        "Sale created successfully",
    )))
}

/// Get a sale with its items
#[utoipa::path(
    get,
    path = "/api/v1/sales/{id}",
    params(("id" = Uuid, Path, description = "Sale ID")),
    responses(
        (status = 200, description = "Sale fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .sales
        .get(user.tenant_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(detail)))
}

/// Creates the router for sale endpoints
pub fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sales).post(create_sale))
        .route("/:id", get(get_sale))
}
