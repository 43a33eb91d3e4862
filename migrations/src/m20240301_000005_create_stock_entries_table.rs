use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_users_table::Users;
use super::m20240301_000004_create_products_table::Products;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockEntries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StockEntries::ProductId).integer().not_null())
                    // zero is only written by inventory adjustments
                    .col(
                        ColumnDef::new(StockEntries::Quantity)
                            .integer()
                            .not_null()
                            .check(Expr::col(StockEntries::Quantity).gte(0)),
                    )
                    .col(
                        ColumnDef::new(StockEntries::UnitValue)
                            .decimal_len(12, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StockEntries::EntryDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StockEntries::UserId).integer().not_null())
                    .col(ColumnDef::new(StockEntries::Notes).text().null())
                    .col(
                        ColumnDef::new(StockEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_entries_product_id")
                            .from(StockEntries::Table, StockEntries::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_entries_user_id")
                            .from(StockEntries::Table, StockEntries::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum StockEntries {
    Table,
    Id,
    ProductId,
    Quantity,
    UnitValue,
    EntryDate,
    UserId,
    Notes,
    CreatedAt,
}
