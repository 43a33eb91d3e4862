use sea_orm_migration::prelude::*;

use super::m20240301_000005_create_stock_entries_table::StockEntries;
use super::m20240301_000006_create_stock_exits_table::StockExits;
use super::m20240301_000007_create_stock_exit_items_table::StockExitItems;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Stock derivation aggregates both ledger sides by product
        manager
            .create_index(
                Index::create()
                    .name("idx_stock_entries_product_id")
                    .table(StockEntries::Table)
                    .col(StockEntries::ProductId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_exit_items_product_id")
                    .table(StockExitItems::Table)
                    .col(StockExitItems::ProductId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_exit_items_exit_id")
                    .table(StockExitItems::Table)
                    .col(StockExitItems::ExitId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stock_exits_created_at")
                    .table(StockExits::Table)
                    .col(StockExits::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_stock_exits_created_at")
                    .table(StockExits::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_stock_exit_items_exit_id")
                    .table(StockExitItems::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_stock_exit_items_product_id")
                    .table(StockExitItems::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_stock_entries_product_id")
                    .table(StockEntries::Table)
                    .to_owned(),
            )
            .await
    }
}
