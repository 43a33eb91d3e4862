//! Reconciles a physically counted quantity with the derived stock level by
//! writing one corrective ledger row. Stock itself is never stored.

use std::sync::Arc;

use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    db::{with_transaction, DbPool},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        exit_orders::{insert_exit_order, lock_products, NewExitItem, NewExitOrder},
        stock_entries::{insert_entry, NewStockEntry},
        stock_level::current_stock,
    },
};

pub const ADJUSTMENT_TICKET_NUMBER: &str = "ADJUSTMENT";
pub const ADJUSTMENT_TICKET_LINK: &str = "N/A";

/// Body of `POST /stock/adjust`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    pub product_id: Option<i32>,
    /// Counted quantity. Accepts an integer or a string holding one.
    #[schema(value_type = Option<i64>, example = 12)]
    pub new_quantity: Option<Value>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdjustmentAction {
    NoChange,
    EntryRecorded { entry_id: i32 },
    ExitRecorded { exit_id: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AdjustmentResult {
    pub product_id: i32,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub difference: i64,
    pub action: AdjustmentAction,
    pub message: String,
}

fn adjustment_note(reason: &str) -> String {
    format!("inventory adjustment: {}", reason)
}

/// Reads the counted quantity. Anything other than a non-negative integer
/// (or its decimal string form) is rejected.
fn parse_reported_quantity(value: Option<&Value>) -> Result<i64, ServiceError> {
    let quantity = match value {
        None | Some(Value::Null) => {
            return Err(ServiceError::validation("new_quantity is required"))
        }
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    }
    .ok_or_else(|| ServiceError::validation("new_quantity must be an integer"))?;

    if quantity < 0 {
        return Err(ServiceError::validation("new_quantity must not be negative"));
    }
    Ok(quantity)
}

fn correction_quantity(difference: i64) -> Result<i32, ServiceError> {
    i32::try_from(difference.unsigned_abs())
        .map_err(|_| ServiceError::validation("adjustment is too large"))
}

#[derive(Clone)]
pub struct InventoryAdjustmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryAdjustmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Brings `current_stock(product)` to the reported quantity.
    ///
    /// A surplus becomes an entry valued at zero; a shortfall becomes a
    /// one-item exit order under the adjustment ticket. The lock, the read
    /// and the write share one transaction.
    #[instrument(skip(self, request), fields(product_id = ?request.product_id))]
    pub async fn adjust(
        &self,
        actor_id: i32,
        request: AdjustStockRequest,
    ) -> Result<AdjustmentResult, ServiceError> {
        let product_id = request
            .product_id
            .ok_or_else(|| ServiceError::validation("product_id is required"))?;
        let reported = parse_reported_quantity(request.new_quantity.as_ref())?;
        let reason = request
            .reason
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ServiceError::validation("reason is required"))?;

        let note = adjustment_note(&reason);
        let result = with_transaction(self.db_pool.as_ref(), "adjust_inventory", move |txn| {
            Box::pin(async move {
                lock_products(txn, [product_id]).await?;
                apply_adjustment(txn, actor_id, product_id, reported, note).await
            })
        })
        .await?;

        if result.action != AdjustmentAction::NoChange {
            let direction = if result.difference > 0 { "increase" } else { "decrease" };
            counter!("stockroom.inventory.adjustments", 1, "direction" => direction);
            info!(
                product_id,
                previous = result.previous_stock,
                new = result.new_stock,
                "inventory adjusted"
            );
            self.event_sender
                .publish(Event::InventoryAdjusted {
                    product_id,
                    previous_stock: result.previous_stock,
                    new_stock: result.new_stock,
                    reason,
                    user_id: actor_id,
                })
                .await;
        }

        Ok(result)
    }
}

async fn apply_adjustment<C>(
    txn: &C,
    actor_id: i32,
    product_id: i32,
    reported: i64,
    note: String,
) -> Result<AdjustmentResult, ServiceError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let previous_stock = current_stock(txn, product_id).await?;
    let difference = reported - previous_stock;

    let action = if difference == 0 {
        AdjustmentAction::NoChange
    } else if difference > 0 {
        let entry = insert_entry(
            txn,
            NewStockEntry {
                product_id,
                quantity: correction_quantity(difference)?,
                unit_value: Decimal::ZERO,
                entry_date: None,
                user_id: actor_id,
                notes: Some(note),
            },
        )
        .await?;
        AdjustmentAction::EntryRecorded { entry_id: entry.id }
    } else {
        let item = NewExitItem {
            product_id,
            quantity: correction_quantity(difference)?,
            serial_number: None,
            asset_number: None,
        };
        let (exit, _) = insert_exit_order(
            txn,
            NewExitOrder {
                ticket_number: ADJUSTMENT_TICKET_NUMBER.to_string(),
                ticket_link: ADJUSTMENT_TICKET_LINK.to_string(),
                reason: Some(note),
                delivery_date: None,
                requester_person_id: None,
                user_id: actor_id,
            },
            &[item],
        )
        .await?;
        AdjustmentAction::ExitRecorded { exit_id: exit.id }
    };

    let message = match action {
        AdjustmentAction::NoChange => "No adjustment needed".to_string(),
        AdjustmentAction::EntryRecorded { .. } => {
            format!("Stock increased by {} to {}", difference, reported)
        }
        AdjustmentAction::ExitRecorded { .. } => {
            format!("Stock decreased by {} to {}", -difference, reported)
        }
    };

    Ok(AdjustmentResult {
        product_id,
        previous_stock,
        new_stock: reported,
        difference,
        action,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{stock_entry, stock_exit, stock_exit_item};
    use crate::test_support::{event_sender, memory_db, seed_entry, seed_exit, seed_product, seed_user};
    use assert_matches::assert_matches;
    use rstest::rstest;
    use sea_orm::{EntityTrait, PaginatorTrait};
    use serde_json::json;

    fn request(product_id: i32, new_quantity: Value) -> AdjustStockRequest {
        AdjustStockRequest {
            product_id: Some(product_id),
            new_quantity: Some(new_quantity),
            reason: Some("cycle count".into()),
        }
    }

    #[rstest]
    #[case(json!(7), 7)]
    #[case(json!("7"), 7)]
    #[case(json!(" 0 "), 0)]
    fn reported_quantity_accepts_integers(#[case] raw: Value, #[case] expected: i64) {
        assert_eq!(parse_reported_quantity(Some(&raw)).unwrap(), expected);
    }

    #[rstest]
    #[case(json!(-1))]
    #[case(json!("-4"))]
    #[case(json!(2.5))]
    #[case(json!("ten"))]
    #[case(json!(true))]
    #[case(Value::Null)]
    fn reported_quantity_rejects_everything_else(#[case] raw: Value) {
        assert_matches!(
            parse_reported_quantity(Some(&raw)),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn matching_count_writes_nothing() {
        let db = Arc::new(memory_db().await);
        let user = seed_user(&db, "Admin").await;
        let product = seed_product(&db, "Monitor").await;
        seed_entry(&db, product, 4, user).await;
        let service = InventoryAdjustmentService::new(db.clone(), event_sender());

        let result = service.adjust(user, request(product, json!(4))).await.unwrap();
        assert_eq!(result.action, AdjustmentAction::NoChange);
        assert_eq!(result.message, "No adjustment needed");
        assert_eq!(stock_entry::Entity::find().count(db.as_ref()).await.unwrap(), 1);
        assert_eq!(stock_exit::Entity::find().count(db.as_ref()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn surplus_records_zero_value_entry() {
        let db = Arc::new(memory_db().await);
        let user = seed_user(&db, "Admin").await;
        let product = seed_product(&db, "Monitor").await;
        seed_entry(&db, product, 10, user).await;
        seed_exit(&db, user, &[(product, 3)]).await;
        let service = InventoryAdjustmentService::new(db.clone(), event_sender());

        let result = service.adjust(user, request(product, json!(12))).await.unwrap();
        assert_eq!(result.previous_stock, 7);
        assert_eq!(result.difference, 5);

        let entry_id = assert_matches!(result.action, AdjustmentAction::EntryRecorded { entry_id } => entry_id);
        let entry = stock_entry::Entity::find_by_id(entry_id)
            .one(db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.quantity, 5);
        assert_eq!(entry.unit_value, Decimal::ZERO);
        assert_eq!(entry.notes.as_deref(), Some("inventory adjustment: cycle count"));
        assert_eq!(current_stock(db.as_ref(), product).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn shortfall_records_adjustment_exit_order() {
        let db = Arc::new(memory_db().await);
        let user = seed_user(&db, "Admin").await;
        let product = seed_product(&db, "Monitor").await;
        seed_entry(&db, product, 10, user).await;
        let service = InventoryAdjustmentService::new(db.clone(), event_sender());

        let result = service.adjust(user, request(product, json!("7"))).await.unwrap();
        assert_eq!(result.difference, -3);
        let exit_id = assert_matches!(result.action, AdjustmentAction::ExitRecorded { exit_id } => exit_id);

        let exit = stock_exit::Entity::find_by_id(exit_id)
            .one(db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit.ticket_number, ADJUSTMENT_TICKET_NUMBER);
        assert_eq!(exit.ticket_link, ADJUSTMENT_TICKET_LINK);
        assert_eq!(exit.requester_person_id, None);
        assert_eq!(exit.reason.as_deref(), Some("inventory adjustment: cycle count"));

        let items = stock_exit_item::Entity::find().all(db.as_ref()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!((items[0].product_id, items[0].quantity), (product, 3));
        assert_eq!(current_stock(db.as_ref(), product).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn count_to_zero_empties_the_product() {
        let db = Arc::new(memory_db().await);
        let user = seed_user(&db, "Admin").await;
        let product = seed_product(&db, "Keyboard").await;
        seed_entry(&db, product, 2, user).await;
        let service = InventoryAdjustmentService::new(db.clone(), event_sender());

        service.adjust(user, request(product, json!(0))).await.unwrap();
        assert_eq!(current_stock(db.as_ref(), product).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejects_bad_requests_before_writing() {
        let db = Arc::new(memory_db().await);
        let user = seed_user(&db, "Admin").await;
        let product = seed_product(&db, "Keyboard").await;
        let service = InventoryAdjustmentService::new(db.clone(), event_sender());

        assert_matches!(
            service.adjust(user, request(product, json!(-2))).await,
            Err(ServiceError::ValidationError(_))
        );

        let mut no_reason = request(product, json!(3));
        no_reason.reason = Some("  ".into());
        assert_matches!(
            service.adjust(user, no_reason).await,
            Err(ServiceError::ValidationError(_))
        );

        assert_matches!(
            service.adjust(user, request(product + 50, json!(3))).await,
            Err(ServiceError::NotFound(_))
        );
        assert_eq!(stock_entry::Entity::find().count(db.as_ref()).await.unwrap(), 0);
    }
}
