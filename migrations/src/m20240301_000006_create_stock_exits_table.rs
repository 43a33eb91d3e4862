use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_users_table::Users;
use super::m20240301_000003_create_people_table::People;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Order headers; requester is null only for adjustment orders
        manager
            .create_table(
                Table::create()
                    .table(StockExits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockExits::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StockExits::TicketNumber).string().not_null())
                    .col(ColumnDef::new(StockExits::TicketLink).string().not_null())
                    .col(ColumnDef::new(StockExits::Reason).text().null())
                    .col(ColumnDef::new(StockExits::DeliveryDate).date().null())
                    .col(ColumnDef::new(StockExits::RequesterPersonId).integer().null())
                    .col(ColumnDef::new(StockExits::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(StockExits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_exits_requester_person_id")
                            .from(StockExits::Table, StockExits::RequesterPersonId)
                            .to(People::Table, People::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_exits_user_id")
                            .from(StockExits::Table, StockExits::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockExits::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum StockExits {
    Table,
    Id,
    TicketNumber,
    TicketLink,
    Reason,
    DeliveryDate,
    RequesterPersonId,
    UserId,
    CreatedAt,
}
