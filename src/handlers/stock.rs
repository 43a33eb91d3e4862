//! Ledger endpoints: inventory, entries, exit orders and adjustments.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{
    auth::AuthUser,
    entities::stock_entry,
    errors::ServiceError,
    handlers::common::{confirmed, created, success, CreatedResult},
    services::{
        exit_orders::{CreateExitOrderRequest, ExitOrderDetail, ExitOrderSummary},
        inventory_adjustment::{AdjustStockRequest, AdjustmentResult},
        stock_entries::{RecordEntryRequest, StockEntryView},
        stock_level::ProductStock,
    },
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/stock/inventory",
    responses(
        (status = 200, description = "Derived stock for every product", body = ApiResponse<Vec<ProductStock>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn list_inventory(State(state): State<AppState>) -> ApiResult<Vec<ProductStock>> {
    Ok(success(state.services.stock_levels.inventory().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/inventory/{product_id}",
    params(("product_id" = i32, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Derived stock for one product", body = ApiResponse<ProductStock>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn get_product_stock(
    State(state): State<AppState>,
    Path(product_id): Path<i32>,
) -> ApiResult<ProductStock> {
    Ok(success(
        state.services.stock_levels.product_stock(product_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/entries",
    responses(
        (status = 200, description = "Entries, newest first", body = ApiResponse<Vec<StockEntryView>>)
    ),
    tag = "stock"
)]
pub async fn list_entries(State(state): State<AppState>) -> ApiResult<Vec<StockEntryView>> {
    Ok(success(state.services.entries.list_entries().await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/stock/entries",
    request_body = RecordEntryRequest,
    responses(
        (status = 201, description = "Entry recorded"),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn record_entry(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    payload: Result<Json<RecordEntryRequest>, JsonRejection>,
) -> CreatedResult<stock_entry::Model> {
    let Json(request) = payload?;
    let entry = state
        .services
        .entries
        .record_entry(actor.user_id, request)
        .await?;
    Ok(created(entry))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stock/entries/{id}",
    params(("id" = i32, Path, description = "Stock entry ID")),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.entries.delete_entry(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/exits",
    responses(
        (status = 200, description = "Exit orders, newest first", body = ApiResponse<Vec<ExitOrderSummary>>)
    ),
    tag = "stock"
)]
pub async fn list_exit_orders(State(state): State<AppState>) -> ApiResult<Vec<ExitOrderSummary>> {
    Ok(success(state.services.exit_orders.list_exit_orders().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/exits/{id}",
    params(("id" = i32, Path, description = "Exit order ID")),
    responses(
        (status = 200, description = "Exit order with items", body = ApiResponse<ExitOrderDetail>),
        (status = 404, description = "Exit order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn get_exit_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> ApiResult<ExitOrderDetail> {
    Ok(success(state.services.exit_orders.get_exit_order(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/stock/exits",
    request_body = CreateExitOrderRequest,
    responses(
        (status = 201, description = "Exit order committed", body = ApiResponse<ExitOrderDetail>),
        (status = 400, description = "Invalid request or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Requester or product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn create_exit_order(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    payload: Result<Json<CreateExitOrderRequest>, JsonRejection>,
) -> CreatedResult<ExitOrderDetail> {
    let Json(request) = payload?;
    let order = state
        .services
        .exit_orders
        .create_exit_order(actor.user_id, request)
        .await?;
    Ok(created(order))
}

#[utoipa::path(
    post,
    path = "/api/v1/stock/adjust",
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock reconciled", body = ApiResponse<AdjustmentResult>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    payload: Result<Json<AdjustStockRequest>, JsonRejection>,
) -> ApiResult<AdjustmentResult> {
    let Json(request) = payload?;
    let result = state
        .services
        .adjustments
        .adjust(actor.user_id, request)
        .await?;
    let message = result.message.clone();
    Ok(confirmed(result, message))
}
