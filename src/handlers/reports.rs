use axum::extract::{rejection::QueryRejection, Query, State};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    handlers::common::success,
    services::reports::{
        DashboardSummary, DateRange, ExitReportFilter, ExitReportRow, TopMovingItem,
        TopRequester, TopSector,
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WindowQuery {
    /// Look-back window in days; the configured default when absent
    pub days: Option<u32>,
}

impl WindowQuery {
    fn days(&self, default: u32) -> u32 {
        self.days.unwrap_or(default).clamp(1, 365)
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard-summary",
    responses((status = 200, description = "Stock totals and low-stock products", body = ApiResponse<DashboardSummary>)),
    tag = "reports"
)]
pub async fn dashboard_summary(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    Ok(success(state.services.reports.dashboard_summary().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/top-moving-items",
    params(DateRange),
    responses((status = 200, description = "Top five products by quantity sent out", body = ApiResponse<Vec<TopMovingItem>>)),
    tag = "reports"
)]
pub async fn top_moving_items(
    State(state): State<AppState>,
    query: Result<Query<DateRange>, QueryRejection>,
) -> ApiResult<Vec<TopMovingItem>> {
    let Query(range) = query?;
    Ok(success(state.services.reports.top_moving_items(range).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard/top-sectors",
    params(WindowQuery),
    responses((status = 200, description = "Top five sectors by requested quantity", body = ApiResponse<Vec<TopSector>>)),
    tag = "reports"
)]
pub async fn top_sectors(
    State(state): State<AppState>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Vec<TopSector>> {
    let Query(window) = query?;
    let reports = &state.services.reports;
    let days = window.days(reports.window_days());
    Ok(success(reports.top_sectors(days).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard/top-requesters",
    params(WindowQuery),
    responses((status = 200, description = "Top five requesters by order count", body = ApiResponse<Vec<TopRequester>>)),
    tag = "reports"
)]
pub async fn top_requesters(
    State(state): State<AppState>,
    query: Result<Query<WindowQuery>, QueryRejection>,
) -> ApiResult<Vec<TopRequester>> {
    let Query(window) = query?;
    let reports = &state.services.reports;
    let days = window.days(reports.window_days());
    Ok(success(reports.top_requesters(days).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/stock-exits",
    params(ExitReportFilter),
    responses(
        (status = 200, description = "Filtered exit orders", body = ApiResponse<Vec<ExitReportRow>>),
        (status = 403, description = "Admin role required", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn stock_exit_report(
    State(state): State<AppState>,
    query: Result<Query<ExitReportFilter>, QueryRejection>,
) -> ApiResult<Vec<ExitReportRow>> {
    let Query(filter) = query?;
    Ok(success(state.services.reports.exit_report(filter).await?))
}
