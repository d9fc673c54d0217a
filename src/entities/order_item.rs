use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Price snapshot of one purchased part.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub part_id: Uuid,
    pub part_name: String,
    pub quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub unit_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total_price: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::commerce::part::Entity",
        from = "Column::PartId",
        to = "super::commerce::part::Column::Id"
    )]
    Part,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::commerce::part::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Part.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// `total_price` is always derived from quantity and unit price at write time.
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let quantity = match &self.quantity {
            ActiveValue::Set(q) | ActiveValue::Unchanged(q) => Some(*q),
            ActiveValue::NotSet => None,
        };
        let unit_price = match &self.unit_price {
            ActiveValue::Set(p) | ActiveValue::Unchanged(p) => Some(*p),
            ActiveValue::NotSet => None,
        };
        if let (Some(quantity), Some(unit_price)) = (quantity, unit_price) {
            self.total_price = ActiveValue::Set(unit_price * Decimal::from(quantity));
        }
        Ok(self)
    }
}
