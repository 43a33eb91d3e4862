use sea_orm_migration::prelude::*;

use super::m20240301_000004_create_products_table::Products;
use super::m20240301_000006_create_stock_exits_table::StockExits;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StockExitItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockExitItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StockExitItems::ExitId).integer().not_null())
                    .col(ColumnDef::new(StockExitItems::ProductId).integer().not_null())
                    .col(
                        ColumnDef::new(StockExitItems::Quantity)
                            .integer()
                            .not_null()
                            .check(Expr::col(StockExitItems::Quantity).gt(0)),
                    )
                    .col(ColumnDef::new(StockExitItems::SerialNumber).string().null())
                    .col(ColumnDef::new(StockExitItems::AssetNumber).string().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_exit_items_exit_id")
                            .from(StockExitItems::Table, StockExitItems::ExitId)
                            .to(StockExits::Table, StockExits::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_exit_items_product_id")
                            .from(StockExitItems::Table, StockExitItems::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockExitItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum StockExitItems {
    Table,
    Id,
    ExitId,
    ProductId,
    Quantity,
    SerialNumber,
    AssetNumber,
}
