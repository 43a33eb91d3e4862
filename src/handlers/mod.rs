pub mod common;
pub mod health;
pub mod reference_data;
pub mod reports;
pub mod stock;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        exit_orders::ExitOrderService, inventory_adjustment::InventoryAdjustmentService,
        reference_data::ReferenceDataService, reports::ReportService,
        stock_entries::StockEntryService, stock_level::StockLevelService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub stock_levels: Arc<StockLevelService>,
    pub entries: Arc<StockEntryService>,
    pub exit_orders: Arc<ExitOrderService>,
    pub adjustments: Arc<InventoryAdjustmentService>,
    pub reference_data: Arc<ReferenceDataService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self {
            stock_levels: Arc::new(StockLevelService::new(db_pool.clone())),
            entries: Arc::new(StockEntryService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            exit_orders: Arc::new(ExitOrderService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            adjustments: Arc::new(InventoryAdjustmentService::new(
                db_pool.clone(),
                event_sender,
            )),
            reference_data: Arc::new(ReferenceDataService::new(db_pool.clone())),
            reports: Arc::new(ReportService::new(
                db_pool,
                config.low_stock_threshold,
                config.report_window_days,
            )),
        }
    }
}
