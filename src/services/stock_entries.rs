use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entities::{product, stock_entry},
    errors::ServiceError,
    events::{Event, EventSender},
    services::reference_data::{find_product, DisplayNames},
};

/// Body of `POST /stock/entries`
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RecordEntryRequest {
    pub product_id: Option<i32>,
    pub quantity: Option<i32>,
    #[schema(value_type = Option<String>, example = "12.50")]
    pub unit_value: Option<Decimal>,
    pub entry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Already-validated entry row. `quantity` may be computed by the adjustment engine.
#[derive(Debug, Clone)]
pub(crate) struct NewStockEntry {
    pub product_id: i32,
    pub quantity: i32,
    pub unit_value: Decimal,
    pub entry_date: Option<DateTime<Utc>>,
    pub user_id: i32,
    pub notes: Option<String>,
}

/// The single insert path for entries.
pub(crate) async fn insert_entry<C: ConnectionTrait>(
    db: &C,
    entry: NewStockEntry,
) -> Result<stock_entry::Model, ServiceError> {
    let mut active = stock_entry::ActiveModel {
        product_id: Set(entry.product_id),
        quantity: Set(entry.quantity),
        unit_value: Set(entry.unit_value),
        user_id: Set(entry.user_id),
        notes: Set(entry.notes),
        ..Default::default()
    };
    if let Some(date) = entry.entry_date {
        active.entry_date = Set(date);
    }
    Ok(active.insert(db).await?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StockEntryView {
    pub id: i32,
    pub product_id: i32,
    pub product_name: Option<String>,
    pub product_model: Option<String>,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_value: Decimal,
    pub entry_date: DateTime<Utc>,
    pub user_id: i32,
    pub user_name: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct StockEntryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockEntryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(product_id = ?request.product_id))]
    pub async fn record_entry(
        &self,
        actor_id: i32,
        request: RecordEntryRequest,
    ) -> Result<stock_entry::Model, ServiceError> {
        let product_id = request
            .product_id
            .ok_or_else(|| ServiceError::validation("product_id is required"))?;
        let quantity = match request.quantity {
            Some(q) if q > 0 => q,
            Some(_) => return Err(ServiceError::validation("quantity must be greater than 0")),
            None => return Err(ServiceError::validation("quantity is required")),
        };
        let unit_value = match request.unit_value {
            Some(v) if v >= Decimal::ZERO => v,
            Some(_) => return Err(ServiceError::validation("unit_value must not be negative")),
            None => return Err(ServiceError::validation("unit_value is required")),
        };

        let db = self.db_pool.as_ref();
        find_product(db, product_id).await?;

        let entry = insert_entry(
            db,
            NewStockEntry {
                product_id,
                quantity,
                unit_value,
                entry_date: request.entry_date,
                user_id: actor_id,
                notes: request
                    .notes
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
            },
        )
        .await?;

        info!(entry_id = entry.id, product_id, quantity, "stock entry recorded");
        self.event_sender
            .publish(Event::StockEntryRecorded {
                entry_id: entry.id,
                product_id,
                quantity,
                user_id: actor_id,
            })
            .await;

        Ok(entry)
    }

    /// Every entry, newest entry date first.
    pub async fn list_entries(&self) -> Result<Vec<StockEntryView>, ServiceError> {
        let db = self.db_pool.as_ref();
        let rows = stock_entry::Entity::find()
            .find_also_related(product::Entity)
            .order_by_desc(stock_entry::Column::EntryDate)
            .order_by_desc(stock_entry::Column::Id)
            .all(db)
            .await?;

        let names =
            DisplayNames::load(db, std::iter::empty(), rows.iter().map(|(e, _)| e.user_id))
                .await?;

        Ok(rows
            .into_iter()
            .map(|(entry, product)| StockEntryView {
                id: entry.id,
                product_id: entry.product_id,
                product_name: product.as_ref().map(|p| p.name.clone()),
                product_model: product.and_then(|p| p.model),
                quantity: entry.quantity,
                unit_value: entry.unit_value,
                entry_date: entry.entry_date,
                user_id: entry.user_id,
                user_name: names.user_name(entry.user_id),
                notes: entry.notes,
                created_at: entry.created_at,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn delete_entry(&self, entry_id: i32) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let entry = stock_entry::Entity::find_by_id(entry_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Stock entry {} not found", entry_id)))?;

        let result = stock_entry::Entity::delete_by_id(entry_id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found(format!(
                "Stock entry {} not found",
                entry_id
            )));
        }

        info!(entry_id, product_id = entry.product_id, "stock entry deleted");
        self.event_sender
            .publish(Event::StockEntryDeleted {
                entry_id,
                product_id: entry.product_id,
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stock_level::current_stock;
    use crate::test_support::{event_sender, memory_db, seed_product, seed_user};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn request(product_id: i32, quantity: i32) -> RecordEntryRequest {
        RecordEntryRequest {
            product_id: Some(product_id),
            quantity: Some(quantity),
            unit_value: Some(dec!(4.90)),
            entry_date: None,
            notes: Some(" first batch ".into()),
        }
    }

    #[tokio::test]
    async fn recorded_entry_raises_stock_and_defaults_date() {
        let db = Arc::new(memory_db().await);
        let user = seed_user(&db, "Operator").await;
        let pen = seed_product(&db, "Pen").await;
        let service = StockEntryService::new(db.clone(), event_sender());

        let before = Utc::now();
        let entry = service.record_entry(user, request(pen, 12)).await.unwrap();

        assert!(entry.entry_date >= before);
        assert_eq!(entry.notes.as_deref(), Some("first batch"));
        assert_eq!(entry.unit_value, dec!(4.90));
        assert_eq!(current_stock(db.as_ref(), pen).await.unwrap(), 12);

        let listed = service.list_entries().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].product_name.as_deref(), Some("Pen"));
        assert_eq!(listed[0].user_name.as_deref(), Some("Operator"));
    }

    #[tokio::test]
    async fn entry_validation_rejects_bad_input() {
        let db = Arc::new(memory_db().await);
        let user = seed_user(&db, "Operator").await;
        let pen = seed_product(&db, "Pen").await;
        let service = StockEntryService::new(db, event_sender());

        assert_matches!(
            service.record_entry(user, request(pen, 0)).await,
            Err(ServiceError::ValidationError(_))
        );
        let mut negative_value = request(pen, 1);
        negative_value.unit_value = Some(dec!(-1));
        assert_matches!(
            service.record_entry(user, negative_value).await,
            Err(ServiceError::ValidationError(_))
        );
        let mut missing_value = request(pen, 1);
        missing_value.unit_value = None;
        assert_matches!(
            service.record_entry(user, missing_value).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            service.record_entry(user, request(9999, 1)).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn deleting_entry_removes_it_from_the_ledger() {
        let db = Arc::new(memory_db().await);
        let user = seed_user(&db, "Operator").await;
        let pen = seed_product(&db, "Pen").await;
        let service = StockEntryService::new(db.clone(), event_sender());
        let entry = service.record_entry(user, request(pen, 5)).await.unwrap();

        service.delete_entry(entry.id).await.unwrap();

        assert_eq!(current_stock(db.as_ref(), pen).await.unwrap(), 0);
        assert_matches!(
            service.delete_entry(entry.id).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
