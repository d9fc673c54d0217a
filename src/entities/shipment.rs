use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Fulfilment record; one per order. `status` mirrors the newest
/// tracking entry.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    #[sea_orm(unique)]
    pub tracking_number: String,
    #[sea_orm(nullable)]
    pub shipping_method_id: Option<Uuid>,
    pub status: ShipmentStatus,
    #[sea_orm(nullable)]
    pub carrier: Option<String>,
    #[sea_orm(nullable)]
    pub estimated_delivery_date: Option<NaiveDate>,
    #[sea_orm(nullable)]
    pub actual_delivery_date: Option<NaiveDate>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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
        belongs_to = "super::shipping_method::Entity",
        from = "Column::ShippingMethodId",
        to = "super::shipping_method::Column::Id"
    )]
    ShippingMethod,
    #[sea_orm(has_many = "super::shipment_tracking::Entity")]
    TrackingHistory,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::shipping_method::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ShippingMethod.def()
    }
}

impl Related<super::shipment_tracking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TrackingHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "out_for_delivery")]
    OutForDelivery,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "returned")]
    Returned,
}

impl ShipmentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered | ShipmentStatus::Failed | ShipmentStatus::Returned
        )
    }

    /// Forward-only progression; failure and return can interrupt any
    /// shipment that has not finished.
    pub fn can_transition_to(self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;
        if self.is_terminal() {
            return false;
        }
        match next {
            Failed | Returned => true,
            _ => matches!(
                (self, next),
                (Pending, Processing)
                    | (Processing, InTransit)
                    | (InTransit, OutForDelivery)
                    | (OutForDelivery, Delivered)
            ),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::InTransit => "In Transit",
            Self::OutForDelivery => "Out for Delivery",
            Self::Delivered => "Delivered",
            Self::Failed => "Failed Delivery",
            Self::Returned => "Returned",
        }
    }
}
