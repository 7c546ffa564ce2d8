use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_opname_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub stock_opname_id: Uuid,
    pub product_id: Uuid,
    /// Product stock at session creation time.
    pub system_quantity: Decimal,
    /// Null until the item has been counted.
    pub physical_quantity: Option<Decimal>,
    /// `physical_quantity - system_quantity`, derived when counted.
    pub difference: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_opname::Entity",
        from = "Column::StockOpnameId",
        to = "super::stock_opname::Column::Id"
    )]
    StockOpname,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::stock_opname::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockOpname.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
