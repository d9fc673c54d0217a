use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Saved delivery details for an account, maintained by the account
/// collaborator and read at checkout.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "customer_profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,
    #[sea_orm(nullable)]
    pub email: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: String,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// A profile can stand in for the checkout form only when the
    /// delivery fields are filled in.
    pub fn has_delivery_address(&self) -> bool {
        ![&self.address, &self.city, &self.state]
            .iter()
            .any(|field| field.trim().is_empty())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
