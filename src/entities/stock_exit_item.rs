use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_exit_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub exit_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub serial_number: Option<String>,
    pub asset_number: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_exit::Entity",
        from = "Column::ExitId",
        to = "super::stock_exit::Column::Id",
        on_delete = "Cascade"
    )]
    StockExit,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::stock_exit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockExit.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
