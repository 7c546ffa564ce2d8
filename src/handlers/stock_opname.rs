use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginatedResponse,
};
use crate::{
    auth::AuthenticatedUser,
    entities::stock_opname::OpnameStatus,
    errors::ApiError,
    services::stock_opname::{CreateOpnameInput, OpnameCountInput, OpnameFilter},
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
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
pub struct CreateOpnameRequest {
    pub branch_id: Uuid,
    pub opname_date: NaiveDate,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OpnameCountRequest {
    pub item_id: Uuid,
    pub physical_quantity: Decimal,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOpnameItemsRequest {
    #[validate(length(min = 1))]
    pub items: Vec<OpnameCountRequest>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OpnameListQuery {
    /// One of: draft, in_progress, completed, cancelled
    pub status: Option<String>,
    /// Matches against the opname number
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

/// List stock opnames
#[utoipa::path(
    get,
    path = "/api/v1/stock-opnames",
    params(OpnameListQuery),
    responses(
        (status = 200, description = "Stock opnames fetched", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "stock-opnames"
)]
pub async fn list_opnames(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<OpnameListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            s.parse::<OpnameStatus>()
                .map_err(|_| ApiError::ValidationError(format!("Unknown status: {}", s)))
        })
        .transpose()?;

    let (items, total) = state
        .services
        .stock_opname
        .list(
            user.tenant_id,
            OpnameFilter {
                status,
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

/// Open a new count session snapshotting current stock
#[utoipa::path(
    post,
    path = "/api/v1/stock-opnames",
    request_body = CreateOpnameRequest,
    responses(
        (status = 201, description = "Stock opname created", body = crate::ApiResponse<serde_json::Value>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-opnames"
)]
pub async fn create_opname(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOpnameRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .stock_opname
        .create(
            user.tenant_id,
            user.user_id,
            CreateOpnameInput {
                branch_id: payload.branch_id,
                opname_date: payload.opname_date,
                notes: payload.notes,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ApiResponse::with_message(
        detail,
        "Stock opname created with all products",
    )))
}

/// Get an opname with its count sheet
#[utoipa::path(
    get,
    path = "/api/v1/stock-opnames/{id}",
    params(("id" = Uuid, Path, description = "Stock opname ID")),
    responses(
        (status = 200, description = "Stock opname fetched", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Stock opname not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-opnames"
)]
pub async fn get_opname(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .stock_opname
        .get(user.tenant_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success(detail)))
}

/// Start counting (draft to in progress)
#[utoipa::path(
    post,
    path = "/api/v1/stock-opnames/{id}/start",
    params(("id" = Uuid, Path, description = "Stock opname ID")),
    responses(
        (status = 200, description = "Stock opname started", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-opnames"
)]
pub async fn start_opname(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let opname = state
        .services
        .stock_opname
        .start(user.tenant_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        opname,
        "Stock opname started",
    )))
}

/// Record physical counts for items on the sheet
#[utoipa::path(
    put,
    path = "/api/v1/stock-opnames/{id}/items",
    params(("id" = Uuid, Path, description = "Stock opname ID")),
    request_body = UpdateOpnameItemsRequest,
    responses(
        (status = 200, description = "Item counts updated", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Session is not open for counting", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-opnames"
)]
pub async fn update_opname_items(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOpnameItemsRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let detail = state
        .services
        .stock_opname
        .update_items(
            user.tenant_id,
            id,
            payload
                .items
                .into_iter()
                .map(|item| OpnameCountInput {
                    item_id: item.item_id,
                    physical_quantity: item.physical_quantity,
                    notes: item.notes,
                })
                .collect(),
        )
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        detail,
        "Item counts updated",
    )))
}

/// Complete the session and apply stock corrections
#[utoipa::path(
    post,
    path = "/api/v1/stock-opnames/{id}/complete",
    params(("id" = Uuid, Path, description = "Stock opname ID")),
    responses(
        (status = 200, description = "Stock opname completed", body = crate::ApiResponse<serde_json::Value>),
        (status = 422, description = "Some items are not counted yet", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-opnames"
)]
pub async fn complete_opname(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .stock_opname
        .complete(user.tenant_id, user.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        detail,
        "Stock opname completed and adjustments applied",
    )))
}

/// Cancel an open session
#[utoipa::path(
    post,
    path = "/api/v1/stock-opnames/{id}/cancel",
    params(("id" = Uuid, Path, description = "Stock opname ID")),
    responses(
        (status = 200, description = "Stock opname cancelled", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Invalid state transition", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-opnames"
)]
pub async fn cancel_opname(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let opname = state
        .services
        .stock_opname
        .cancel(user.tenant_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::with_message(
        opname,
        "Stock opname cancelled",
    )))
}

/// Delete a draft session
#[utoipa::path(
    delete,
    path = "/api/v1/stock-opnames/{id}",
    params(("id" = Uuid, Path, description = "Stock opname ID")),
    responses(
        (status = 204, description = "Stock opname deleted"),
        (status = 409, description = "Only drafts can be deleted", body = crate::errors::ErrorResponse)
    ),
    tag = "stock-opnames"
)]
pub async fn delete_opname(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .stock_opname
        .delete(user.tenant_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// Creates the router for stock opname endpoints
pub fn stock_opname_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_opnames).post(create_opname))
        .route("/:id", get(get_opname).delete(delete_opname))
        .route("/:id/start", post(start_opname))
        .route("/:id/items", put(update_opname_items))
        .route("/:id/complete", post(complete_opname))
        .route("/:id/cancel", post(cancel_opname))
}
