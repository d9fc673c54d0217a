use crate::{
    auth::CallerIdentity,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, OrderPaymentStatus, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
    entities::payment::PaymentMethod,
    errors::ServiceError,
    money::StoreMoney,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_ORDERS_PER_PAGE: u64 = 10;

/// Delivery address captured on the order at checkout
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OrderLine {
    pub part_id: Uuid,
    pub part_name: String,
    pub quantity: i32,
    #[schema(value_type = Object)]
    pub unit_price: StoreMoney,
    #[schema(value_type = Object)]
    pub total_price: StoreMoney,
}

/// Order with its item snapshot
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OrderDetails {
    pub id: Uuid,
    pub order_number: String,
    #[schema(value_type = String)]
    pub status: OrderStatus,
    pub status_label: String,
    #[schema(value_type = String)]
    pub payment_status: OrderPaymentStatus,
    pub payment_method: PaymentMethod,
    #[schema(value_type = Object)]
    pub subtotal: StoreMoney,
    #[schema(value_type = Object)]
    pub shipping_amount: StoreMoney,
    #[schema(value_type = Object)]
    pub total_amount: StoreMoney,
    pub contact_email: Option<String>,
    pub shipping_address: ShippingAddress,
    pub items: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}

/// Order history row
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    #[schema(value_type = String)]
    pub status: OrderStatus,
    #[schema(value_type = String)]
    pub payment_status: OrderPaymentStatus,
    pub payment_method: PaymentMethod,
    #[schema(value_type = Object)]
    pub total_amount: StoreMoney,
    pub created_at: DateTime<Utc>,
}

impl OrderSummary {
    fn from_model(order: OrderModel) -> Result<Self, ServiceError> {
        Ok(Self {
            total_amount: order.total_money()?,
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            created_at: order.created_at,
        })
    }
}

impl OrderDetails {
    pub fn from_parts(order: OrderModel, items: Vec<OrderItemModel>) -> Result<Self, ServiceError> {
        let items = items
            .into_iter()
            .map(|item| {
                Ok(OrderLine {
                    unit_price: StoreMoney::from_stored(item.unit_price, &order.currency)?,
                    total_price: StoreMoney::from_stored(item.total_price, &order.currency)?,
                    part_id: item.part_id,
                    part_name: item.part_name,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(Self {
            subtotal: order.subtotal_money()?,
            shipping_amount: order.shipping_money()?,
            total_amount: order.total_money()?,
            status_label: order.status.label().to_string(),
            id: order.id,
            order_number: order.order_number,
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            contact_email: order.contact_email,
            shipping_address: ShippingAddress {
                first_name: order.shipping_first_name,
                last_name: order.shipping_last_name,
                address: order.shipping_address,
                city: order.shipping_city,
                state: order.shipping_state,
                postal_code: order.shipping_postal_code,
                phone: order.shipping_phone,
            },
            items,
            created_at: order.created_at,
        })
    }
}

/// Read access to a buyer's own orders. Orders are written by checkout and
/// payment reconciliation only.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists the caller's orders, newest first
    #[instrument(skip(self))]
    pub async fn list_orders(&self, caller: &CallerIdentity, page: u64, per_page: u64) -> Result<(Vec<OrderSummary>, u64), ServiceError> {
        let user_id = caller.require_user()?;
        let per_page = if per_page == 0 { DEFAULT_ORDERS_PER_PAGE } else { per_page.min(100) };

        let paginator = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page.saturating_sub(1)).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        let summaries = orders
            .into_iter()
            .map(OrderSummary::from_model)
            .collect::<Result<Vec<_>, _>>()?;

        info!(total = total, page = page, returned_count = summaries.len(), "Orders listed");
        Ok((summaries, total))
    }

    /// Single order with items; someone else's order is reported as not found
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, caller: &CallerIdentity, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let user_id = caller.require_user()?;
        let order = find_owned_order(&*self.db, user_id, order_id).await?;
        order_details(&*self.db, order).await
    }
}

pub(crate) async fn find_owned_order<C: ConnectionTrait>(conn: &C, user_id: Uuid, order_id: Uuid) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .filter(order::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

pub(crate) async fn order_details<C: ConnectionTrait>(conn: &C, order: OrderModel) -> Result<OrderDetails, ServiceError> {
    let items = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .order_by_asc(order_item::Column::PartName)
        .all(conn)
        .await?;
    OrderDetails::from_parts(order, items)
}
