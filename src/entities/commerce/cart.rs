use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CallerIdentity;

/// Shopping cart entity. Exactly one of `user_id` / `session_key` is set,
/// and each is unique, so an owner has at most one cart.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(nullable, unique)]
    pub user_id: Option<Uuid>,
    #[sea_orm(nullable, unique)]
    pub session_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_owned_by(&self, caller: &CallerIdentity) -> bool {
        match caller {
            CallerIdentity::User { user_id } => self.user_id == Some(*user_id),
            CallerIdentity::Session { session_key } => {
                self.session_key.as_deref() == Some(session_key.as_str())
            }
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
