use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{handlers, services};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockroom API",
        version = "1.0.0",
        description = r#"
# Stockroom inventory ledger

Stock is never stored. Every level is derived from the entry and exit ledgers,
and corrections are written as ordinary ledger rows.

## Authentication

Every `/api/v1` endpoint requires a bearer JWT whose `role` claim is `admin` or `user`:

```
Authorization: Bearer <your-jwt-token>
```

## Errors

```json
{
  "error": "Bad Request",
  "message": "Insufficient stock for product 'USB cable' (id 7): available 3, requested 5",
  "details": {"product_id": 7, "product_name": "USB cable", "available": 3, "requested": 5},
  "request_id": "7d6a…",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
"#
    ),
    paths(
        handlers::health::health_check,
        handlers::health::status,
        handlers::stock::list_inventory,
        handlers::stock::get_product_stock,
        handlers::stock::list_entries,
        handlers::stock::record_entry,
        handlers::stock::delete_entry,
        handlers::stock::list_exit_orders,
        handlers::stock::get_exit_order,
        handlers::stock::create_exit_order,
        handlers::stock::adjust_stock,
        handlers::reference_data::list_products,
        handlers::reference_data::get_product,
        handlers::reference_data::create_product,
        handlers::reference_data::update_product,
        handlers::reference_data::delete_product,
        handlers::reference_data::list_sectors,
        handlers::reference_data::create_sector,
        handlers::reference_data::update_sector,
        handlers::reference_data::delete_sector,
        handlers::reference_data::list_people,
        handlers::reference_data::create_person,
        handlers::reference_data::update_person,
        handlers::reference_data::delete_person,
        handlers::reports::dashboard_summary,
        handlers::reports::top_moving_items,
        handlers::reports::top_sectors,
        handlers::reports::top_requesters,
        handlers::reports::stock_exit_report,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        services::stock_level::ProductStock,
        services::stock_entries::RecordEntryRequest,
        services::stock_entries::StockEntryView,
        services::exit_orders::CreateExitOrderRequest,
        services::exit_orders::ExitItemRequest,
        services::exit_orders::ExitOrderDetail,
        services::exit_orders::ExitOrderItemView,
        services::exit_orders::ExitOrderSummary,
        services::inventory_adjustment::AdjustStockRequest,
        services::inventory_adjustment::AdjustmentAction,
        services::inventory_adjustment::AdjustmentResult,
        services::reference_data::ProductInput,
        services::reference_data::SectorInput,
        services::reference_data::PersonInput,
        services::reference_data::PersonView,
        services::reports::DashboardSummary,
        services::reports::TopMovingItem,
        services::reports::TopSector,
        services::reports::TopRequester,
        services::reports::ExitReportRow,
        handlers::health::HealthResponse,
        handlers::health::StatusResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "stock", description = "Inventory, entries, exit orders and adjustments"),
        (name = "reference-data", description = "Products, sectors and people"),
        (name = "reports", description = "Dashboard and exit reports"),
        (name = "operations", description = "Health and status")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    )
}
