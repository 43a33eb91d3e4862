pub use sea_orm_migration::prelude::*;

mod m20240301_000001_create_users_table;
mod m20240301_000002_create_sectors_table;
mod m20240301_000003_create_people_table;
mod m20240301_000004_create_products_table;
mod m20240301_000005_create_stock_entries_table;
mod m20240301_000006_create_stock_exits_table;
mod m20240301_000007_create_stock_exit_items_table;
mod m20240315_000008_add_ledger_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_users_table::Migration),
            Box::new(m20240301_000002_create_sectors_table::Migration),
            Box::new(m20240301_000003_create_people_table::Migration),
            Box::new(m20240301_000004_create_products_table::Migration),
            Box::new(m20240301_000005_create_stock_entries_table::Migration),
            Box::new(m20240301_000006_create_stock_exits_table::Migration),
            Box::new(m20240301_000007_create_stock_exit_items_table::Migration),
            Box::new(m20240315_000008_add_ledger_indexes::Migration),
        ]
    }
}
