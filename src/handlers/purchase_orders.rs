use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse,
};
use crate::{
    auth::AuthenticatedUser,
    entities::purchase_order::PurchaseOrderStatus,
    errors::ApiError,
    services::procurement::{
        CreatePurchaseOrderInput, PurchaseOrderFilter, PurchaseOrderItemInput, ReceiveInput,
        ReceiveItemInput, UpdatePurchaseOrderInput,
    },
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
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
pub struct PurchaseOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    pub branch_id: Uuid,
    pub supplier_id: Uuid,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub discount: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<PurchaseOrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePurchaseOrderRequest {
    pub supplier_id: Uuid,
    pub order_date: NaiveDate,
    pub expected_date: Option<NaiveDate>,
    pub discount: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<PurchaseOrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReceiveItemRequest {
    pub item_id: Uuid,
    pub received_quantity: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReceivePurchaseOrderRequest {
    #[validate(length(min = 1))]
    pub items: Vec<ReceiveItemRequest>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PurchaseOrderListQuery {
    /// One of: draft, pending, partial, received, cancelled
    pub status: Option<String>,
    pub supplier_id: Option<Uuid>,
    /// Matches against the PO number
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

fn item_inputs(items: Vec<PurchaseOrderItemRequest>) -> Vec<PurchaseOrderItemInput> {
    items
        .into_iter()
        .map(|item| PurchaseOrderItemInput {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount: item.discount.unwrap_or(Decimal::ZERO),
        })
        .collect()
}

/// List purchase orders
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders",
    params(PurchaseOrderListQuery),
    responses(
        (status = 200, description = "Purchase orders fetched", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PurchaseOrderListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<PurchaseOrderStatus>()
                .map_err(|_| ApiError::ValidationError(format!("Unknown status: {}", s)))
        })
        .transpose()?;

    let (items, total) = state
        .services
        .procurement
        .list(
            user.tenant_id,
            PurchaseOrderFilter {
                status,
                supplier_id: query.supplier_id,
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

/// Create a purchase order (draft)
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders",
    request_body = CreatePurchaseOrderRequest,
    responses(
        (status = 201, description = "Purchase order created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .procurement
        .create(
            user.tenant_id,
            user.user_id,
            CreatePurchaseOrderInput {
                branch_id: payload.branch_id,
                supplier_id: payload.supplier_id,
                order_date: payload.order_date,
                expected_date: payload.expected_date,
                discount: payload.discount.unwrap_or(Decimal::ZERO),
                tax: payload.tax.unwrap_or(Decimal::ZERO),
                notes: payload.notes,
                items: item_inputs(payload.items),
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        detail,
        "Purchase order created successfully",
    )))
}

/// Get a purchase order with its items
#[utoipa::path(
    get,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .procurement
        .get(user.tenant_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(detail)))
}

/// Update a draft purchase order
#[utoipa::path(
    put,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body = UpdatePurchaseOrderRequest,
    responses(
        (status = 200, description = "Purchase order updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Not editable in its current status", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn update_purchase_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePurchaseOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .procurement
        .update(
            user.tenant_id,
            id,
            UpdatePurchaseOrderInput {
                supplier_id: payload.supplier_id,
                order_date: payload.order_date,
                expected_date: payload.expected_date,
                discount: payload.discount.unwrap_or(Decimal::ZERO),
                tax: payload.tax.unwrap_or(Decimal::ZERO),
                notes: payload.notes,
                items: item_inputs(payload.items),
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        detail,
        "Purchase order updated successfully",
    )))
}

/// Submit a draft purchase order for approval
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/submit",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order submitted", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn submit_purchase_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .procurement
        .submit(user.tenant_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        order,
        "Purchase order submitted for approval",
    )))
}

/// Approve a pending purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/approve",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order approved", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn approve_purchase_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .procurement
        .approve(user.tenant_id, user.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        order,
        "Purchase order approved",
    )))
}

/// Receive delivered items into stock
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/receive",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    request_body = ReceivePurchaseOrderRequest,
    responses(
        (status = 200, description = "Items received", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Order is not receivable", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReceivePurchaseOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .procurement
        .receive(
            user.tenant_id,
            user.user_id,
            id,
            ReceiveInput {
                items: payload
                    .items
                    .into_iter()
                    .map(|item| ReceiveItemInput {
                        item_id: item.item_id,
                        received_quantity: item.received_quantity,
                    })
                    .collect(),
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        detail,
        "Items received and stock updated",
    )))
}

/// Cancel a purchase order
#[utoipa::path(
    post,
    path = "/api/v1/purchase-orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 200, description = "Purchase order cancelled", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .procurement
        .cancel(user.tenant_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        order,
        "Purchase order cancelled",
    )))
}

/// Delete a draft purchase order
#[utoipa::path(
    delete,
    path = "/api/v1/purchase-orders/{id}",
    params(("id" = Uuid, Path, description = "Purchase order ID")),
    responses(
        (status = 204, description = "Purchase order deleted"),
        (status = 409, description = "Only drafts can be deleted", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .procurement
        .delete(user.tenant_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Creates the router for purchase order endpoints
pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_purchase_orders).post(create_purchase_order))
        .route(
            "/:id",
            get(get_purchase_order)
                .put(update_purchase_order)
                .delete(delete_purchase_order),
        )
        .route("/:id/submit", post(submit_purchase_order))
        .route("/:id/approve", post(approve_purchase_order))
        .route("/:id/receive", post(receive_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
}
