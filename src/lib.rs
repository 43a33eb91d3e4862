//! Stockroom API
//!
//! Inventory ledger for an IT stockroom: stock entries, multi-item exit
//! orders and count adjustments, with stock levels always derived from the
//! ledger rows.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod openapi;
pub mod services;
pub mod tracing;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post, put},
    Extension, Router,
};
use chrono::Utc;
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use utoipa::ToSchema;

use crate::auth::{AuthRouterExt, AuthService, Role};
use crate::db::DbPool;
use crate::events::EventSender;
use crate::handlers::AppServices;

/// Roles allowed on the day-to-day stock routes
const STAFF: &[Role] = &[Role::Admin, Role::User];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: config::AppConfig,
    pub event_sender: Arc<EventSender>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: config::AppConfig, event_sender: Arc<EventSender>) -> Self {
        let services = AppServices::new(db.clone(), event_sender.clone(), &config);
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<axum::Json<ApiResponse<T>>, errors::ServiceError>;

/// Every `/api/v1` route, role-gated.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{reference_data as refdata, reports, stock};

    let stock_staff = Router::new()
        .route("/stock/inventory", get(stock::list_inventory))
        .route(
            "/stock/inventory/:product_id",
            get(stock::get_product_stock),
        )
        .route(
            "/stock/entries",
            get(stock::list_entries).post(stock::record_entry),
        )
        .route(
            "/stock/exits",
            get(stock::list_exit_orders).post(stock::create_exit_order),
        )
        .route("/stock/exits/:id", get(stock::get_exit_order))
        .with_roles(STAFF);

    let stock_admin = Router::new()
        .route("/stock/entries/:id", delete(stock::delete_entry))
        .route("/stock/adjust", post(stock::adjust_stock))
        .with_roles(ADMIN_ONLY);

    let refdata_staff = Router::new()
        .route(
            "/products",
            get(refdata::list_products).post(refdata::create_product),
        )
        .route(
            "/products/:id",
            get(refdata::get_product).put(refdata::update_product),
        )
        .route(
            "/sectors",
            get(refdata::list_sectors).post(refdata::create_sector),
        )
        .route("/sectors/:id", put(refdata::update_sector))
        .route(
            "/people",
            get(refdata::list_people).post(refdata::create_person),
        )
        .route("/people/:id", put(refdata::update_person))
        .with_roles(STAFF);

    let refdata_admin = Router::new()
        .route("/products/:id", delete(refdata::delete_product))
        .route("/sectors/:id", delete(refdata::delete_sector))
        .route("/people/:id", delete(refdata::delete_person))
        .with_roles(ADMIN_ONLY);

    let reports_staff = Router::new()
        .route("/reports/dashboard-summary", get(reports::dashboard_summary))
        .route("/reports/top-moving-items", get(reports::top_moving_items))
        .route("/reports/dashboard/top-sectors", get(reports::top_sectors))
        .route(
            "/reports/dashboard/top-requesters",
            get(reports::top_requesters),
        )
        .with_roles(STAFF);

    let reports_admin = Router::new()
        .route("/reports/stock-exits", get(reports::stock_exit_report))
        .with_roles(ADMIN_ONLY);

    Router::new()
        .merge(stock_staff)
        .merge(stock_admin)
        .merge(refdata_staff)
        .merge(refdata_admin)
        .merge(reports_staff)
        .merge(reports_admin)
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        if cfg.is_production() {
            ::tracing::warn!("no CORS origins configured; cross-origin requests will be refused");
            CorsLayer::new()
        } else {
            CorsLayer::permissive()
        }
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// The complete application: operational routes, the versioned API and the
/// shared middleware stack.
pub fn app_router(state: AppState, auth_service: Arc<AuthService>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/status", get(handlers::health::status))
        .merge(openapi::openapi_routes())
        .nest("/api/v1", api_v1_routes())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors)
        // AuthService for the auth middleware
        .layer(Extension(auth_service))
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
