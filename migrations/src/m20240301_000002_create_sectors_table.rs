use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Sectors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sectors::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sectors::Name).string().not_null())
                    .col(ColumnDef::new(Sectors::Description).text().null())
                    .col(
                        ColumnDef::new(Sectors::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sectors::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Sectors {
    Table,
    Id,
    Name,
    Description,
    CreatedAt,
}
