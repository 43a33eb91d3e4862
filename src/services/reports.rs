//! Read-only views over the ledger for the dashboard and the admin report.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::{
    sea_query::{Expr, Func},
    ColumnTrait, Condition, EntityTrait, JoinType, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::DbPool,
    entities::{person, product, stock_exit, stock_exit_item},
    errors::ServiceError,
    services::{
        exit_orders::item_statistics,
        reference_data::DisplayNames,
        stock_level::{inventory_levels, ProductStock},
    },
};

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_items: i64,
    pub low_stock_count: usize,
    pub low_stock_items: Vec<ProductStock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TopMovingItem {
    pub product_id: i32,
    pub name: String,
    pub model: Option<String>,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TopSector {
    pub sector_id: i32,
    pub sector_name: String,
    pub total_quantity: i64,
    pub order_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TopRequester {
    pub person_id: i32,
    pub name: String,
    pub sector_name: Option<String>,
    pub order_count: i64,
    pub total_quantity: i64,
}

/// Query string of `GET /reports/top-moving-items`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRange {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Query string of `GET /reports/stock-exits`
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExitReportFilter {
    /// Case-insensitive substring of the ticket number
    pub ticket: Option<String>,
    pub user_id: Option<i32>,
    pub person_id: Option<i32>,
    pub sector_id: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExitReportRow {
    pub id: i32,
    pub ticket_number: String,
    pub ticket_link: String,
    pub reason: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub requester_person_id: Option<i32>,
    pub requester_name: Option<String>,
    pub sector_name: Option<String>,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub item_count: i64,
    pub total_quantity: i64,
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Inclusive calendar-date window on `stock_exits.created_at`.
fn created_between(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Condition {
    let mut cond = Condition::all();
    if let Some(start) = start {
        cond = cond.add(stock_exit::Column::CreatedAt.gte(start_of(start)));
    }
    if let Some(end) = end.and_then(|d| d.succ_opt()) {
        cond = cond.add(stock_exit::Column::CreatedAt.lt(start_of(end)));
    }
    cond
}

#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
    low_stock_threshold: i64,
    window_days: u32,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>, low_stock_threshold: i64, window_days: u32) -> Self {
        Self {
            db_pool,
            low_stock_threshold,
            window_days,
        }
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    /// Total units on hand and the products at or under the low-stock threshold.
    #[instrument(skip(self))]
    pub async fn dashboard_summary(&self) -> Result<DashboardSummary, ServiceError> {
        let levels = inventory_levels(self.db_pool.as_ref()).await?;
        let total_items = levels.iter().map(|p| p.current_stock).sum();
        let low_stock_items: Vec<ProductStock> = levels
            .into_iter()
            .filter(|p| p.current_stock <= self.low_stock_threshold)
            .collect();

        Ok(DashboardSummary {
            total_items,
            low_stock_count: low_stock_items.len(),
            low_stock_items,
        })
    }

    /// Products ranked by quantity sent out in the window.
    #[instrument(skip(self))]
    pub async fn top_moving_items(
        &self,
        range: DateRange,
    ) -> Result<Vec<TopMovingItem>, ServiceError> {
        let db = self.db_pool.as_ref();
        let totals: Vec<(i32, Option<i64>)> = stock_exit_item::Entity::find()
            .select_only()
            .column(stock_exit_item::Column::ProductId)
            .column_as(
                Expr::col((stock_exit_item::Entity, stock_exit_item::Column::Quantity)).sum(),
                "total",
            )
            .join(JoinType::InnerJoin, stock_exit_item::Relation::StockExit.def())
            .filter(created_between(range.start_date, range.end_date))
            .group_by(stock_exit_item::Column::ProductId)
            .into_tuple::<(i32, Option<i64>)>()
            .all(db)
            .await?;

        let products: HashMap<i32, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(totals.iter().map(|(id, _)| *id)))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut ranked: Vec<TopMovingItem> = totals
            .into_iter()
            .filter_map(|(product_id, total)| {
                let product = products.get(&product_id)?;
                Some(TopMovingItem {
                    product_id,
                    name: product.name.clone(),
                    model: product.model.clone(),
                    total_quantity: total.unwrap_or(0),
                })
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.total_quantity
                .cmp(&a.total_quantity)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked.truncate(TOP_N);
        Ok(ranked)
    }

    /// Orders created in the last `window_days` that name a requester.
    async fn recent_requested_orders(
        &self,
        window_days: u32,
    ) -> Result<Vec<stock_exit::Model>, ServiceError> {
        let since = Utc::now() - Duration::days(i64::from(window_days));
        Ok(stock_exit::Entity::find()
            .filter(stock_exit::Column::CreatedAt.gte(since))
            .filter(stock_exit::Column::RequesterPersonId.is_not_null())
            .all(self.db_pool.as_ref())
            .await?)
    }

    /// Sectors ranked by requested quantity, then by number of orders.
    #[instrument(skip(self))]
    pub async fn top_sectors(&self, window_days: u32) -> Result<Vec<TopSector>, ServiceError> {
        let db = self.db_pool.as_ref();
        let exits = self.recent_requested_orders(window_days).await?;
        let stats = item_statistics(db, exits.iter().map(|e| e.id)).await?;
        let names =
            DisplayNames::load(db, exits.iter().filter_map(|e| e.requester_person_id), []).await?;

        let mut by_sector: HashMap<i32, TopSector> = HashMap::new();
        for exit in &exits {
            let Some(sector_id) = names.requester_sector_id(exit.requester_person_id) else {
                continue;
            };
            let row = by_sector.entry(sector_id).or_insert_with(|| TopSector {
                sector_id,
                sector_name: names
                    .sector_name(exit.requester_person_id)
                    .unwrap_or_default(),
                total_quantity: 0,
                order_count: 0,
            });
            row.order_count += 1;
            row.total_quantity += stats.get(&exit.id).map_or(0, |s| s.total_quantity);
        }

        let mut ranked: Vec<TopSector> = by_sector.into_values().collect();
        ranked.sort_by_key(|s| {
            (
                Reverse(s.total_quantity),
                Reverse(s.order_count),
                s.sector_name.clone(),
            )
        });
        ranked.truncate(TOP_N);
        Ok(ranked)
    }

    /// People ranked by number of orders requested in the window.
    #[instrument(skip(self))]
    pub async fn top_requesters(
        &self,
        window_days: u32,
    ) -> Result<Vec<TopRequester>, ServiceError> {
        let db = self.db_pool.as_ref();
        let exits = self.recent_requested_orders(window_days).await?;
        let stats = item_statistics(db, exits.iter().map(|e| e.id)).await?;
        let names =
            DisplayNames::load(db, exits.iter().filter_map(|e| e.requester_person_id), []).await?;

        let mut by_person: HashMap<i32, TopRequester> = HashMap::new();
        for exit in &exits {
            let Some(person_id) = exit.requester_person_id else {
                continue;
            };
            let row = by_person.entry(person_id).or_insert_with(|| TopRequester {
                person_id,
                name: names.requester_name(Some(person_id)).unwrap_or_default(),
                sector_name: names.sector_name(Some(person_id)),
                order_count: 0,
                total_quantity: 0,
            });
            row.order_count += 1;
            row.total_quantity += stats.get(&exit.id).map_or(0, |s| s.total_quantity);
        }

        let mut ranked: Vec<TopRequester> = by_person.into_values().collect();
        ranked.sort_by_key(|r| (Reverse(r.order_count), r.name.clone()));
        ranked.truncate(TOP_N);
        Ok(ranked)
    }

    /// Filtered exit orders, newest first.
    #[instrument(skip(self))]
    pub async fn exit_report(
        &self,
        filter: ExitReportFilter,
    ) -> Result<Vec<ExitReportRow>, ServiceError> {
        let db = self.db_pool.as_ref();
        let mut cond = created_between(filter.start_date, filter.end_date);

        if let Some(ticket) = filter
            .ticket
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            let pattern = format!("%{}%", ticket.to_lowercase());
            cond = cond.add(
                Expr::expr(Func::lower(Expr::col((
                    stock_exit::Entity,
                    stock_exit::Column::TicketNumber,
                ))))
                .like(pattern),
            );
        }
        if let Some(user_id) = filter.user_id {
            cond = cond.add(stock_exit::Column::UserId.eq(user_id));
        }
        if let Some(person_id) = filter.person_id {
            cond = cond.add(stock_exit::Column::RequesterPersonId.eq(person_id));
        }
        if let Some(sector_id) = filter.sector_id {
            let members: HashSet<i32> = person::Entity::find()
                .filter(person::Column::SectorId.eq(sector_id))
                .all(db)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect();
            cond = cond.add(stock_exit::Column::RequesterPersonId.is_in(members));
        }

        let exits = stock_exit::Entity::find()
            .filter(cond)
            .order_by_desc(stock_exit::Column::CreatedAt)
            .order_by_desc(stock_exit::Column::Id)
            .all(db)
            .await?;

        let stats = item_statistics(db, exits.iter().map(|e| e.id)).await?;
        let names = DisplayNames::load(
            db,
            exits.iter().filter_map(|e| e.requester_person_id),
            exits.iter().map(|e| e.user_id),
        )
        .await?;

        Ok(exits
            .into_iter()
            .map(|exit| {
                let stats = stats.get(&exit.id).copied().unwrap_or_default();
                ExitReportRow {
                    id: exit.id,
                    requester_name: names.requester_name(exit.requester_person_id),
                    sector_name: names.sector_name(exit.requester_person_id),
                    user_name: names.user_name(exit.user_id),
                    ticket_number: exit.ticket_number,
                    ticket_link: exit.ticket_link,
                    reason: exit.reason,
                    delivery_date: exit.delivery_date,
                    created_at: exit.created_at,
                    requester_person_id: exit.requester_person_id,
                    user_id: exit.user_id,
                    item_count: stats.lines,
                    total_quantity: stats.total_quantity,
                }
            })
            .collect())
    }
}
