use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::money::StoreMoney;

/// Sellable part. `stock_quantity` never goes below zero; checkout
/// decrements it with a guarded update.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    pub currency: String,
    pub part_number: String,
    pub condition: PartCondition,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub category_id: Uuid,
    pub manufacturer_id: Uuid,
    #[sea_orm(nullable)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn unit_price(&self) -> Result<StoreMoney, ServiceError> {
        StoreMoney::from_stored(self.price, &self.currency)
    }

    pub fn is_available(&self, quantity: i32) -> bool {
        self.is_active && quantity <= self.stock_quantity
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::manufacturer::Entity",
        from = "Column::ManufacturerId",
        to = "super::manufacturer::Column::Id"
    )]
    Manufacturer,
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::manufacturer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manufacturer.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum PartCondition {
    #[sea_orm(string_value = "new")]
    New,
    /// Foreign-used part imported in good condition
    #[sea_orm(string_value = "tourist")]
    Tourist,
    #[sea_orm(string_value = "used")]
    Used,
}
