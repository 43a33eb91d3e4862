//! Products, people and sectors.
//!
//! The ledger services only consume these as lookups (existence checks and
//! display names); the CRUD surface is plain single-table work.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    db::DbPool,
    entities::{person, product, sector, stock_entry, stock_exit, stock_exit_item, user},
    errors::ServiceError,
};

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProductInput {
    #[serde(default)]
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[validate(length(max = 255))]
    pub model: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SectorInput {
    #[serde(default)]
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct PersonInput {
    #[serde(default)]
    #[validate(length(max = 255), custom = "not_blank")]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub extension_line: Option<String>,
    pub sector_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PersonView {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub extension_line: Option<String>,
    pub sector_id: Option<i32>,
    pub sector_name: Option<String>,
}

pub async fn find_product<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Product {} not found", product_id)))
}

pub async fn find_person<C: ConnectionTrait>(
    db: &C,
    person_id: i32,
) -> Result<person::Model, ServiceError> {
    person::Entity::find_by_id(person_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("Person {} not found", person_id)))
}

async fn ensure_sector_exists<C: ConnectionTrait>(
    db: &C,
    sector_id: Option<i32>,
) -> Result<(), ServiceError> {
    if let Some(id) = sector_id {
        sector::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Sector {} not found", id)))?;
    }
    Ok(())
}

/// Names for the requester, sector and recording user columns of ledger views.
#[derive(Debug, Default)]
pub struct DisplayNames {
    people: HashMap<i32, person::Model>,
    sectors: HashMap<i32, String>,
    users: HashMap<i32, String>,
}

impl DisplayNames {
    pub async fn load<C: ConnectionTrait>(
        db: &C,
        person_ids: impl IntoIterator<Item = i32>,
        user_ids: impl IntoIterator<Item = i32>,
    ) -> Result<Self, DbErr> {
        let person_ids: HashSet<i32> = person_ids.into_iter().collect();
        let user_ids: HashSet<i32> = user_ids.into_iter().collect();

        let people: HashMap<i32, person::Model> = if person_ids.is_empty() {
            HashMap::new()
        } else {
            person::Entity::find()
                .filter(person::Column::Id.is_in(person_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|p| (p.id, p))
                .collect()
        };

        let sector_ids: HashSet<i32> = people.values().filter_map(|p| p.sector_id).collect();
        let sectors = if sector_ids.is_empty() {
            HashMap::new()
        } else {
            sector::Entity::find()
                .filter(sector::Column::Id.is_in(sector_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|s| (s.id, s.name))
                .collect()
        };

        let users = if user_ids.is_empty() {
            HashMap::new()
        } else {
            user::Entity::find()
                .filter(user::Column::Id.is_in(user_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|u| (u.id, u.name))
                .collect()
        };

        Ok(Self {
            people,
            sectors,
            users,
        })
    }

    pub fn requester_name(&self, person_id: Option<i32>) -> Option<String> {
        person_id
            .and_then(|id| self.people.get(&id))
            .map(|p| p.name.clone())
    }

    pub fn requester_sector_id(&self, person_id: Option<i32>) -> Option<i32> {
        person_id
            .and_then(|id| self.people.get(&id))
            .and_then(|p| p.sector_id)
    }

    pub fn sector_name(&self, person_id: Option<i32>) -> Option<String> {
        self.requester_sector_id(person_id)
            .and_then(|id| self.sectors.get(&id))
            .cloned()
    }

    pub fn user_name(&self, user_id: i32) -> Option<String> {
        self.users.get(&user_id).cloned()
    }
}

fn delete_error(err: DbErr, what: String) -> ServiceError {
    match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => {
            ServiceError::ReferentialIntegrity(format!("{} is still referenced", what))
        }
        _ => ServiceError::DatabaseError(err),
    }
}

#[derive(Clone)]
pub struct ReferenceDataService {
    db_pool: Arc<DbPool>,
}

impl ReferenceDataService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    // Products

    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id)
            .all(self.db_pool.as_ref())
            .await?)
    }

    pub async fn get_product(&self, id: i32) -> Result<product::Model, ServiceError> {
        find_product(self.db_pool.as_ref(), id).await
    }

    #[instrument(skip(self))]
    pub async fn create_product(&self, input: ProductInput) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let created = product::ActiveModel {
            name: Set(input.name.trim().to_string()),
            model: Set(trimmed(input.model)),
            description: Set(trimmed(input.description)),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await?;

        info!(product_id = created.id, "product created");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: i32,
        input: ProductInput,
    ) -> Result<product::Model, ServiceError> {
        input.validate()?;
        let db = self.db_pool.as_ref();
        let mut active: product::ActiveModel = find_product(db, id).await?.into();
        active.name = Set(input.name.trim().to_string());
        active.model = Set(trimmed(input.model));
        active.description = Set(trimmed(input.description));
        Ok(active.update(db).await?)
    }

    /// Products with ledger history are permanent.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: i32) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        find_product(db, id).await?;

        let entries = stock_entry::Entity::find()
            .filter(stock_entry::Column::ProductId.eq(id))
            .count(db)
            .await?;
        let exit_items = stock_exit_item::Entity::find()
            .filter(stock_exit_item::Column::ProductId.eq(id))
            .count(db)
            .await?;
        if entries + exit_items > 0 {
            return Err(ServiceError::ReferentialIntegrity(format!(
                "Product {} has {} stock entries and {} exit items and cannot be deleted",
                id, entries, exit_items
            )));
        }

        product::Entity::delete_by_id(id)
            .exec(db)
            .await
            .map_err(|e| delete_error(e, format!("Product {}", id)))?;
        info!(product_id = id, "product deleted");
        Ok(())
    }

    // Sectors

    pub async fn list_sectors(&self) -> Result<Vec<sector::Model>, ServiceError> {
        Ok(sector::Entity::find()
            .order_by_asc(sector::Column::Name)
            .order_by_asc(sector::Column::Id)
            .all(self.db_pool.as_ref())
            .await?)
    }

    #[instrument(skip(self))]
    pub async fn create_sector(&self, input: SectorInput) -> Result<sector::Model, ServiceError> {
        input.validate()?;
        Ok(sector::ActiveModel {
            name: Set(input.name.trim().to_string()),
            description: Set(trimmed(input.description)),
            ..Default::default()
        }
        .insert(self.db_pool.as_ref())
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn update_sector(
        &self,
        id: i32,
        input: SectorInput,
    ) -> Result<sector::Model, ServiceError> {
        input.validate()?;
        let db = self.db_pool.as_ref();
        let existing = sector::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Sector {} not found", id)))?;
        let mut active: sector::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.description = Set(trimmed(input.description));
        Ok(active.update(db).await?)
    }

    /// A sector people still belong to cannot be deleted.
    #[instrument(skip(self))]
    pub async fn delete_sector(&self, id: i32) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        sector::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Sector {} not found", id)))?;

        let members = person::Entity::find()
            .filter(person::Column::SectorId.eq(id))
            .count(db)
            .await?;
        if members > 0 {
            return Err(ServiceError::ReferentialIntegrity(format!(
                "Sector {} still has {} people and cannot be deleted",
                id, members
            )));
        }

        sector::Entity::delete_by_id(id)
            .exec(db)
            .await
            .map_err(|e| delete_error(e, format!("Sector {}", id)))?;
        info!(sector_id = id, "sector deleted");
        Ok(())
    }

    // People

    pub async fn list_people(&self) -> Result<Vec<PersonView>, ServiceError> {
        let db = self.db_pool.as_ref();
        let people = person::Entity::find()
            .find_also_related(sector::Entity)
            .order_by_asc(person::Column::Name)
            .order_by_asc(person::Column::Id)
            .all(db)
            .await?;

        Ok(people
            .into_iter()
            .map(|(p, s)| PersonView {
                id: p.id,
                name: p.name,
                email: p.email,
                extension_line: p.extension_line,
                sector_id: p.sector_id,
                sector_name: s.map(|s| s.name),
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn create_person(&self, input: PersonInput) -> Result<person::Model, ServiceError> {
        input.validate()?;
        let db = self.db_pool.as_ref();
        ensure_sector_exists(db, input.sector_id).await?;

        Ok(person::ActiveModel {
            name: Set(input.name.trim().to_string()),
            email: Set(trimmed(input.email)),
            extension_line: Set(trimmed(input.extension_line)),
            sector_id: Set(input.sector_id),
            ..Default::default()
        }
        .insert(db)
        .await?)
    }

    #[instrument(skip(self))]
    pub async fn update_person(
        &self,
        id: i32,
        input: PersonInput,
    ) -> Result<person::Model, ServiceError> {
        input.validate()?;
        let db = self.db_pool.as_ref();
        let mut active: person::ActiveModel = find_person(db, id).await?.into();
        ensure_sector_exists(db, input.sector_id).await?;

        active.name = Set(input.name.trim().to_string());
        active.email = Set(trimmed(input.email));
        active.extension_line = Set(trimmed(input.extension_line));
        active.sector_id = Set(input.sector_id);
        Ok(active.update(db).await?)
    }

    /// People who requested an exit order stay on record.
    #[instrument(skip(self))]
    pub async fn delete_person(&self, id: i32) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        find_person(db, id).await?;

        let orders = stock_exit::Entity::find()
            .filter(stock_exit::Column::RequesterPersonId.eq(id))
            .count(db)
            .await?;
        if orders > 0 {
            return Err(ServiceError::ReferentialIntegrity(format!(
                "Person {} requested {} exit orders and cannot be deleted",
                id, orders
            )));
        }

        person::Entity::delete_by_id(id)
            .exec(db)
            .await
            .map_err(|e| delete_error(e, format!("Person {}", id)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, seed_entry, seed_product, seed_user};
    use assert_matches::assert_matches;

    fn product_input(name: &str) -> ProductInput {
        ProductInput {
            name: name.into(),
            model: Some("  X200 ".into()),
            description: None,
        }
    }

    #[tokio::test]
    async fn product_crud_trims_and_requires_name() {
        let service = ReferenceDataService::new(Arc::new(memory_db().await));

        let created = service.create_product(product_input("Laptop")).await.unwrap();
        assert_eq!(created.model.as_deref(), Some("X200"));

        let updated = service
            .update_product(created.id, product_input("Laptop Pro"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Laptop Pro");

        assert_matches!(
            service.create_product(product_input("   ")).await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            service.update_product(404, product_input("Ghost")).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn product_with_ledger_rows_cannot_be_deleted() {
        let db = memory_db().await;
        let user = seed_user(&db, "Operator").await;
        let used = seed_product(&db, "Toner").await;
        let unused = seed_product(&db, "Stapler").await;
        seed_entry(&db, used, 3, user).await;
        let service = ReferenceDataService::new(Arc::new(db));

        assert_matches!(
            service.delete_product(used).await,
            Err(ServiceError::ReferentialIntegrity(_))
        );
        service.delete_product(unused).await.unwrap();
        assert_matches!(
            service.delete_product(unused).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn sector_with_people_cannot_be_deleted() {
        let service = ReferenceDataService::new(Arc::new(memory_db().await));
        let it = service
            .create_sector(SectorInput {
                name: "IT".into(),
                description: None,
            })
            .await
            .unwrap();
        let person = service
            .create_person(PersonInput {
                name: "Bruna".into(),
                email: Some("bruna@example.com".into()),
                extension_line: Some("2231".into()),
                sector_id: Some(it.id),
            })
            .await
            .unwrap();

        let listed = service.list_people().await.unwrap();
        assert_eq!(listed[0].sector_name.as_deref(), Some("IT"));

        assert_matches!(
            service.delete_sector(it.id).await,
            Err(ServiceError::ReferentialIntegrity(_))
        );
        let listed = service.list_people().await.unwrap();
        assert_eq!(listed[0].id, person.id);
        assert_eq!(listed[0].sector_id, Some(it.id));

        service.delete_person(person.id).await.unwrap();
        service.delete_sector(it.id).await.unwrap();
        assert_matches!(
            service.delete_sector(it.id).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn person_requires_existing_sector_and_valid_email() {
        let service = ReferenceDataService::new(Arc::new(memory_db().await));

        assert_matches!(
            service
                .create_person(PersonInput {
                    name: "Caio".into(),
                    email: None,
                    extension_line: None,
                    sector_id: Some(77),
                })
                .await,
            Err(ServiceError::NotFound(_))
        );
        assert_matches!(
            service
                .create_person(PersonInput {
                    name: "Caio".into(),
                    email: Some("not-an-email".into()),
                    extension_line: None,
                    sector_id: None,
                })
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }
}
