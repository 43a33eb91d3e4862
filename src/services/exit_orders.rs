//! Exit order builder.
//!
//! Two layers:
//! - [`insert_exit_order`] writes a header and its items as one unit. It knows
//!   nothing about tickets, requesters or stock and is shared with the
//!   adjustment engine.
//! - [`ExitOrderService::create_exit_order`] validates a user request, locks
//!   the products involved, checks availability against the derived stock and
//!   calls the primitive, all inside one transaction.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    db::{with_transaction, DbPool},
    entities::{product, stock_exit, stock_exit_item},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        reference_data::{find_person, DisplayNames},
        stock_level::current_stock,
    },
};

/// One line of `POST /stock/exits`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ExitItemRequest {
    pub product_id: Option<i32>,
    pub quantity: Option<i32>,
    pub serial_number: Option<String>,
    pub asset_number: Option<String>,
}

/// Body of `POST /stock/exits`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CreateExitOrderRequest {
    pub requester_person_id: Option<i32>,
    pub ticket_number: Option<String>,
    pub ticket_link: Option<String>,
    pub reason: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub items: Vec<ExitItemRequest>,
}

/// Header fields accepted by [`insert_exit_order`].
#[derive(Debug, Clone)]
pub(crate) struct NewExitOrder {
    pub ticket_number: String,
    pub ticket_link: String,
    pub reason: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub requester_person_id: Option<i32>,
    pub user_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewExitItem {
    pub product_id: i32,
    pub quantity: i32,
    pub serial_number: Option<String>,
    pub asset_number: Option<String>,
}

/// Inserts the header, then every item, inside its own transaction (a
/// savepoint when `db` is already a transaction). Either all rows are written
/// or none are.
pub(crate) async fn insert_exit_order<C>(
    db: &C,
    header: NewExitOrder,
    items: &[NewExitItem],
) -> Result<(stock_exit::Model, Vec<stock_exit_item::Model>), ServiceError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if items.is_empty() {
        return Err(ServiceError::validation(
            "an exit order must contain at least one item",
        ));
    }

    let txn = db.begin().await?;

    let written = async {
        let exit = stock_exit::ActiveModel {
            ticket_number: Set(header.ticket_number),
            ticket_link: Set(header.ticket_link),
            reason: Set(header.reason),
            delivery_date: Set(header.delivery_date),
            requester_person_id: Set(header.requester_person_id),
            user_id: Set(header.user_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut inserted = Vec::with_capacity(items.len());
        for item in items {
            let row = stock_exit_item::ActiveModel {
                exit_id: Set(exit.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                serial_number: Set(item.serial_number.clone()),
                asset_number: Set(item.asset_number.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            inserted.push(row);
        }
        Ok::<_, ServiceError>((exit, inserted))
    }
    .await;

    match written {
        Ok(rows) => {
            txn.commit().await?;
            Ok(rows)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(error = %rollback_err, "rollback of exit order insert failed");
            }
            Err(e)
        }
    }
}

/// Takes row locks on `product_ids` in ascending id order and returns the
/// products. Any unknown id is a `NotFound`.
///
/// On PostgreSQL this is `SELECT … FOR UPDATE`, which serialises concurrent
/// exit orders and adjustments touching the same product. SQLite has no row
/// locks; its single-writer lock covers the same window.
pub(crate) async fn lock_products<C: ConnectionTrait>(
    db: &C,
    product_ids: impl IntoIterator<Item = i32>,
) -> Result<HashMap<i32, product::Model>, ServiceError> {
    let ids: BTreeSet<i32> = product_ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let locked: HashMap<i32, product::Model> = product::Entity::find()
        .filter(product::Column::Id.is_in(ids.iter().copied()))
        .order_by_asc(product::Column::Id)
        .lock_exclusive()
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    if let Some(missing) = ids.iter().find(|id| !locked.contains_key(id)) {
        return Err(ServiceError::not_found(format!(
            "Product {} not found",
            missing
        )));
    }
    Ok(locked)
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ServiceError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::validation(format!("{} is required", field)))
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug)]
struct ValidatedOrder {
    requester_person_id: i32,
    header: NewExitOrder,
    items: Vec<NewExitItem>,
}

/// Field-level checks, in order, before anything touches the database.
fn validate_request(
    actor_id: i32,
    request: CreateExitOrderRequest,
) -> Result<ValidatedOrder, ServiceError> {
    if request.items.is_empty() {
        return Err(ServiceError::validation(
            "an exit order must contain at least one item",
        ));
    }

    let requester_person_id = request
        .requester_person_id
        .ok_or_else(|| ServiceError::validation("requester_person_id is required"))?;
    let ticket_number = required_text(request.ticket_number, "ticket_number")?;
    let ticket_link = required_text(request.ticket_link, "ticket_link")?;

    let mut items = Vec::with_capacity(request.items.len());
    for (index, item) in request.items.into_iter().enumerate() {
        let product_id = item.product_id.ok_or_else(|| {
            ServiceError::validation(format!("items[{}].product_id is required", index))
        })?;
        let quantity = match item.quantity {
            Some(q) if q > 0 => q,
            Some(_) => {
                return Err(ServiceError::validation(format!(
                    "items[{}].quantity must be greater than 0",
                    index
                )))
            }
            None => {
                return Err(ServiceError::validation(format!(
                    "items[{}].quantity is required",
                    index
                )))
            }
        };
        items.push(NewExitItem {
            product_id,
            quantity,
            serial_number: optional_text(item.serial_number),
            asset_number: optional_text(item.asset_number),
        });
    }

    Ok(ValidatedOrder {
        requester_person_id,
        header: NewExitOrder {
            ticket_number,
            ticket_link,
            reason: optional_text(request.reason),
            delivery_date: request.delivery_date,
            requester_person_id: Some(requester_person_id),
            user_id: actor_id,
        },
        items,
    })
}

/// Rejects the whole order at the first line that does not fit.
///
/// Lines for the same product are kept separate but draw on one running
/// balance, so two lines of 6 against a stock of 10 fail on the second line.
async fn check_availability<C: ConnectionTrait>(
    db: &C,
    products: &HashMap<i32, product::Model>,
    items: &[NewExitItem],
) -> Result<(), ServiceError> {
    let mut remaining: HashMap<i32, i64> = HashMap::new();

    for item in items {
        let available = match remaining.get(&item.product_id) {
            Some(left) => *left,
            None => current_stock(db, item.product_id).await?,
        };
        let requested = i64::from(item.quantity);

        if requested > available {
            let product_name = products
                .get(&item.product_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            return Err(ServiceError::InsufficientStock {
                product_id: item.product_id,
                product_name,
                available: available.max(0),
                requested,
            });
        }
        remaining.insert(item.product_id, available - requested);
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExitOrderItemView {
    pub id: i32,
    pub product_id: i32,
    pub product_name: Option<String>,
    pub product_model: Option<String>,
    pub quantity: i32,
    pub serial_number: Option<String>,
    pub asset_number: Option<String>,
}

/// An order header with its items, as returned after creation and by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExitOrderDetail {
    pub id: i32,
    pub ticket_number: String,
    pub ticket_link: String,
    pub reason: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub requester_person_id: Option<i32>,
    pub requester_name: Option<String>,
    pub sector_name: Option<String>,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ExitOrderItemView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ExitOrderSummary {
    pub id: i32,
    pub ticket_number: String,
    pub ticket_link: String,
    pub reason: Option<String>,
    pub delivery_date: Option<NaiveDate>,
    pub requester_person_id: Option<i32>,
    pub requester_name: Option<String>,
    pub sector_name: Option<String>,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub distinct_items_count: i64,
    pub total_quantity: i64,
}

/// Loads one order with its items sorted by product name, then item id.
pub(crate) async fn load_exit_order<C: ConnectionTrait>(
    db: &C,
    exit_id: i32,
) -> Result<ExitOrderDetail, ServiceError> {
    let exit = stock_exit::Entity::find_by_id(exit_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Exit order {} not found", exit_id)))?;

    let items = stock_exit_item::Entity::find()
        .filter(stock_exit_item::Column::ExitId.eq(exit_id))
        .find_also_related(product::Entity)
        .order_by_asc(product::Column::Name)
        .order_by_asc(stock_exit_item::Column::Id)
        .all(db)
        .await?;

    let names = DisplayNames::load(db, exit.requester_person_id, [exit.user_id]).await?;

    Ok(ExitOrderDetail {
        id: exit.id,
        requester_name: names.requester_name(exit.requester_person_id),
        sector_name: names.sector_name(exit.requester_person_id),
        user_name: names.user_name(exit.user_id),
        ticket_number: exit.ticket_number,
        ticket_link: exit.ticket_link,
        reason: exit.reason,
        delivery_date: exit.delivery_date,
        requester_person_id: exit.requester_person_id,
        user_id: exit.user_id,
        created_at: exit.created_at,
        items: items
            .into_iter()
            .map(|(item, product)| ExitOrderItemView {
                id: item.id,
                product_id: item.product_id,
                product_name: product.as_ref().map(|p| p.name.clone()),
                product_model: product.and_then(|p| p.model),
                quantity: item.quantity,
                serial_number: item.serial_number,
                asset_number: item.asset_number,
            })
            .collect(),
    })
}

#[derive(Clone)]
pub struct ExitOrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ExitOrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Validates and commits a user exit order, returning it as stored.
    #[instrument(skip(self, request), fields(ticket = ?request.ticket_number))]
    pub async fn create_exit_order(
        &self,
        actor_id: i32,
        request: CreateExitOrderRequest,
    ) -> Result<ExitOrderDetail, ServiceError> {
        let order = validate_request(actor_id, request).map_err(|e| {
            counter!("stockroom.exit_orders.rejected", 1, "reason" => e.kind());
            e
        })?;

        let result = with_transaction(self.db_pool.as_ref(), "create_exit_order", move |txn| {
            Box::pin(async move {
                find_person(txn, order.requester_person_id).await?;

                let products =
                    lock_products(txn, order.items.iter().map(|i| i.product_id)).await?;
                check_availability(txn, &products, &order.items).await?;

                let (exit, items) = insert_exit_order(txn, order.header, &order.items).await?;
                debug!(exit_id = exit.id, items = items.len(), "exit order rows written");

                load_exit_order(txn, exit.id).await
            })
        })
        .await;

        let detail = match result {
            Ok(detail) => detail,
            Err(e) => {
                counter!("stockroom.exit_orders.rejected", 1, "reason" => e.kind());
                return Err(e);
            }
        };

        let total_quantity: i64 = detail.items.iter().map(|i| i64::from(i.quantity)).sum();
        counter!("stockroom.exit_orders.created", 1);
        info!(
            exit_id = detail.id,
            ticket_number = %detail.ticket_number,
            items = detail.items.len(),
            total_quantity,
            "exit order created"
        );

        self.event_sender
            .publish(Event::ExitOrderCreated {
                exit_id: detail.id,
                ticket_number: detail.ticket_number.clone(),
                item_count: detail.items.len(),
                total_quantity,
                user_id: actor_id,
            })
            .await;

        Ok(detail)
    }

    pub async fn get_exit_order(&self, exit_id: i32) -> Result<ExitOrderDetail, ServiceError> {
        load_exit_order(self.db_pool.as_ref(), exit_id).await
    }

    /// Newest first, with per-order item statistics.
    pub async fn list_exit_orders(&self) -> Result<Vec<ExitOrderSummary>, ServiceError> {
        let db = self.db_pool.as_ref();
        let exits = stock_exit::Entity::find()
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
                ExitOrderSummary {
                    id: exit.id,
                    requester_name: names.requester_name(exit.requester_person_id),
                    sector_name: names.sector_name(exit.requester_person_id),
                    user_name: names.user_name(exit.user_id),
                    ticket_number: exit.ticket_number,
                    ticket_link: exit.ticket_link,
                    reason: exit.reason,
                    delivery_date: exit.delivery_date,
                    requester_person_id: exit.requester_person_id,
                    user_id: exit.user_id,
                    created_at: exit.created_at,
                    distinct_items_count: stats.distinct_products,
                    total_quantity: stats.total_quantity,
                }
            })
            .collect())
    }
}

/// Line statistics for one exit order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ItemStats {
    pub lines: i64,
    pub distinct_products: i64,
    pub total_quantity: i64,
}

pub(crate) async fn item_statistics<C: ConnectionTrait>(
    db: &C,
    exit_ids: impl IntoIterator<Item = i32>,
) -> Result<HashMap<i32, ItemStats>, ServiceError> {
    let exit_ids: Vec<i32> = exit_ids.into_iter().collect();
    if exit_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(i32, i32, i32)> = stock_exit_item::Entity::find()
        .select_only()
        .column(stock_exit_item::Column::ExitId)
        .column(stock_exit_item::Column::ProductId)
        .column(stock_exit_item::Column::Quantity)
        .filter(stock_exit_item::Column::ExitId.is_in(exit_ids))
        .into_tuple::<(i32, i32, i32)>()
        .all(db)
        .await?;

    let mut products: HashMap<i32, BTreeSet<i32>> = HashMap::new();
    let mut stats: HashMap<i32, ItemStats> = HashMap::new();
    for (exit_id, product_id, quantity) in rows {
        products.entry(exit_id).or_default().insert(product_id);
        let entry = stats.entry(exit_id).or_default();
        entry.lines += 1;
        entry.total_quantity += i64::from(quantity);
    }
    for (exit_id, entry) in stats.iter_mut() {
        entry.distinct_products = products.get(exit_id).map_or(0, |p| p.len() as i64);
    }

    Ok(stats)
}
