use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::money::StoreMoney;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_methods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub base_cost: Decimal,
    pub currency: String,
    pub estimated_days_min: i32,
    pub estimated_days_max: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn cost(&self) -> Result<StoreMoney, ServiceError> {
        StoreMoney::from_stored(self.base_cost, &self.currency)
    }

    pub fn duration_display(&self) -> String {
        duration_display(self.estimated_days_min, self.estimated_days_max)
    }
}

/// "3 business days" or "3-5 business days"
pub fn duration_display(min_days: i32, max_days: i32) -> String {
    if min_days == max_days {
        format!("{} business days", min_days)
    } else {
        format!("{}-{} business days", min_days, max_days)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipments,
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_collapses_equal_bounds() {
        assert_eq!(duration_display(3, 3), "3 business days");
        assert_eq!(duration_display(3, 5), "3-5 business days");
    }
}
