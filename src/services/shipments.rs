use crate::{
    auth::CallerIdentity,
    entities::{
        order::{self, OrderStatus},
        payment::PaymentMethod,
        shipment::{self, ShipmentStatus},
        shipment_tracking, shipping_method, Order, Shipment, ShipmentTracking, ShippingMethod,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::StoreMoney,
    services::orders::find_owned_order,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const BASE_RATE: Decimal = dec!(2000.00);
const OUTSIDE_HUB_SURCHARGE: Decimal = dec!(1000.00);
const WEIGHT_STEP_KG: Decimal = dec!(5);
const WEIGHT_STEP_CHARGE: Decimal = dec!(500.00);
const STANDARD_ESTIMATE: &str = "3-5 business days";

/// States served from the main hubs at the base rate.
const HUB_STATES: [&str; 3] = ["Lagos", "Abuja", "Port Harcourt"];

/// Shipping quotes plus the shipment records maintained by fulfilment staff.
#[derive(Clone)]
pub struct ShippingService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ShippingService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Flat quote by destination state and parcel weight.
    pub fn calculate_shipping(
        &self,
        request: &ShippingQuoteRequest,
    ) -> Result<ShippingQuote, ServiceError> {
        let weight = request.weight_kg.unwrap_or(Decimal::ONE);
        if weight.is_sign_negative() && !weight.is_zero() {
            return Err(ServiceError::ValidationError(
                "Weight cannot be negative".to_string(),
            ));
        }
        Ok(ShippingQuote {
            shipping_cost: quote(request.state.trim(), weight),
            estimated_days: STANDARD_ESTIMATE.to_string(),
        })
    }

    /// Active shipping methods, or the standard rate card when none are set up.
    #[instrument(skip(self))]
    pub async fn shipping_rates(&self) -> Result<Vec<ShippingRate>, ServiceError> {
        let methods = active_shipping_methods(&*self.db).await?;
        if methods.is_empty() {
            return Ok(default_rates());
        }

        methods
            .into_iter()
            .map(|method| {
                Ok(ShippingRate {
                    cost: method.cost()?,
                    duration: method.duration_display(),
                    name: method.name,
                    description: method.description,
                })
            })
            .collect()
    }

    /// Opens the shipment for an order together with its first tracking entry.
    ///
    /// The order must be settled, or be a cash-on-delivery order, and must
    /// not have been cancelled or refunded. One shipment per order.
    #[instrument(skip(self))]
    pub async fn create_shipment(
        &self,
        input: CreateShipmentInput,
    ) -> Result<shipment::Model, ServiceError> {
        input.validate()?;

        let order = Order::find_by_id(input.order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", input.order_id)))?;

        if !is_shippable(&order) {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is not ready to ship",
                order.order_number
            )));
        }

        if Shipment::find()
            .filter(shipment::Column::OrderId.eq(order.id))
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Order {} already has a shipment",
                order.order_number
            )));
        }

        let tracking_number = input
            .tracking_number
            .clone()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(generate_tracking_number);

        if Shipment::find()
            .filter(shipment::Column::TrackingNumber.eq(tracking_number.as_str()))
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "Tracking number {} is already in use",
                tracking_number
            )));
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let shipment = shipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            tracking_number: Set(tracking_number),
            shipping_method_id: Set(input.shipping_method_id.or(order.shipping_method_id)),
            status: Set(ShipmentStatus::Pending),
            carrier: Set(input.carrier),
            estimated_delivery_date: Set(input.estimated_delivery_date),
            actual_delivery_date: Set(None),
            notes: Set(input.notes),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        append_tracking(
            &txn,
            shipment.id,
            ShipmentStatus::Pending,
            "Warehouse",
            "Shipment created",
            now,
        )
        .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ShipmentCreated {
                shipment_id: shipment.id,
                order_id: order.id,
                tracking_number: shipment.tracking_number.clone(),
            })
            .await;

        info!(shipment_id = %shipment.id, order_id = %order.id, "shipment created");
        Ok(shipment)
    }

    /// Moves a shipment forward and appends the matching tracking entry.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        shipment_id: Uuid,
        input: UpdateShipmentStatusInput,
    ) -> Result<shipment::Model, ServiceError> {
        input.validate()?;

        let current = self.get_shipment(shipment_id).await?;
        let old_status = current.status;

        if !old_status.can_transition_to(input.status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move shipment from {} to {}",
                old_status.to_value(),
                input.status.to_value()
            )));
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let mut active: shipment::ActiveModel = current.into();
        active.status = Set(input.status);
        active.updated_at = Set(now);
        if input.status == ShipmentStatus::Delivered {
            active.actual_delivery_date = Set(Some(now.date_naive()));
        }
        let updated = active.update(&txn).await?;

        let description = input
            .description
            .clone()
            .unwrap_or_else(|| input.status.label().to_string());
        append_tracking(
            &txn,
            shipment_id,
            input.status,
            &input.location,
            &description,
            now,
        )
        .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ShipmentStatusChanged {
                shipment_id,
                old_status: old_status.to_value(),
                new_status: input.status.to_value(),
                at: now,
            })
            .await;

        info!(
            %shipment_id,
            from = %old_status.to_value(),
            to = %input.status.to_value(),
            "shipment status updated"
        );
        Ok(updated)
    }

    pub async fn get_shipment(&self, shipment_id: Uuid) -> Result<shipment::Model, ServiceError> {
        Shipment::find_by_id(shipment_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Shipment {} not found", shipment_id)))
    }

    /// Tracking entries, newest first
    pub async fn tracking_history(
        &self,
        shipment_id: Uuid,
    ) -> Result<Vec<shipment_tracking::Model>, ServiceError> {
        self.get_shipment(shipment_id).await?;
        history(&*self.db, shipment_id).await
    }

    /// Buyer-facing tracking for one of their orders.
    ///
    /// Orders without a shipment record get a timeline derived from the
    /// order status.
    #[instrument(skip(self))]
    pub async fn track_order(
        &self,
        caller: &CallerIdentity,
        order_id: Uuid,
    ) -> Result<TrackingInfo, ServiceError> {
        let user_id = caller.require_user()?;
        let order = find_owned_order(&*self.db, user_id, order_id).await?;

        let shipment = Shipment::find()
            .filter(shipment::Column::OrderId.eq(order.id))
            .one(&*self.db)
            .await?;

        match shipment {
            Some(shipment) => {
                let events = history(&*self.db, shipment.id)
                    .await?
                    .into_iter()
                    .map(TrackingEvent::from)
                    .collect();
                Ok(TrackingInfo {
                    order_id: order.id,
                    order_number: order.order_number,
                    tracking_number: shipment.tracking_number,
                    status: shipment.status.label().to_string(),
                    estimated_delivery: shipment
                        .estimated_delivery_date
                        .map(|d| d.format("%d %b %Y").to_string())
                        .unwrap_or_else(|| format!("Within {}", STANDARD_ESTIMATE)),
                    carrier: shipment.carrier,
                    events,
                })
            }
            None => Ok(synthesized_tracking(&order)),
        }
    }
}

/// Active methods, oldest first. The first one is the checkout default.
pub(crate) async fn active_shipping_methods<C>(
    conn: &C,
) -> Result<Vec<shipping_method::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(ShippingMethod::find()
        .filter(shipping_method::Column::IsActive.eq(true))
        .order_by_asc(shipping_method::Column::CreatedAt)
        .all(conn)
        .await?)
}

async fn history<C>(
    conn: &C,
    shipment_id: Uuid,
) -> Result<Vec<shipment_tracking::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(ShipmentTracking::find()
        .filter(shipment_tracking::Column::ShipmentId.eq(shipment_id))
        .order_by_desc(shipment_tracking::Column::Timestamp)
        .all(conn)
        .await?)
}

async fn append_tracking<C>(
    conn: &C,
    shipment_id: Uuid,
    status: ShipmentStatus,
    location: &str,
    description: &str,
    at: DateTime<Utc>,
) -> Result<shipment_tracking::Model, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(shipment_tracking::ActiveModel {
        id: Set(Uuid::new_v4()),
        shipment_id: Set(shipment_id),
        status: Set(status.to_value()),
        location: Set(location.to_string()),
        description: Set(description.to_string()),
        timestamp: Set(at),
    }
    .insert(conn)
    .await?)
}

fn quote(state: &str, weight_kg: Decimal) -> StoreMoney {
    let mut cost = BASE_RATE;
    if !HUB_STATES.contains(&state) {
        cost += OUTSIDE_HUB_SURCHARGE;
    }
    if weight_kg > WEIGHT_STEP_KG {
        cost += WEIGHT_STEP_CHARGE * (weight_kg / WEIGHT_STEP_KG).trunc();
    }
    StoreMoney::new(cost)
}

fn default_rates() -> Vec<ShippingRate> {
    vec![
        ShippingRate {
            name: "Standard Shipping".to_string(),
            cost: StoreMoney::new(dec!(2000.00)),
            duration: "3-5 business days".to_string(),
            description: "Regular delivery service".to_string(),
        },
        ShippingRate {
            name: "Express Shipping".to_string(),
            cost: StoreMoney::new(dec!(5000.00)),
            duration: "1-2 business days".to_string(),
            description: "Fast delivery service".to_string(),
        },
        ShippingRate {
            name: "Same Day Delivery".to_string(),
            cost: StoreMoney::new(dec!(8000.00)),
            duration: "Same day".to_string(),
            description: "Available for Lagos only".to_string(),
        },
    ]
}

fn is_shippable(order: &order::Model) -> bool {
    let open = !matches!(order.status, OrderStatus::Cancelled | OrderStatus::Refunded);
    open && (order.is_paid() || order.payment_method == PaymentMethod::CashOnDelivery)
}

fn generate_tracking_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("TRK{}", hex[..12].to_uppercase())
}

fn synthesized_tracking(order: &order::Model) -> TrackingInfo {
    let mut events = vec![
        TrackingEvent {
            timestamp: order.created_at,
            status: "Order Placed".to_string(),
            location: "Online".to_string(),
            description: None,
        },
        TrackingEvent {
            timestamp: order.created_at,
            status: "Processing".to_string(),
            location: "Warehouse".to_string(),
            description: None,
        },
    ];

    if matches!(order.status, OrderStatus::Shipped | OrderStatus::Delivered) {
        events.push(TrackingEvent {
            timestamp: order.updated_at,
            status: "Shipped".to_string(),
            location: "In Transit".to_string(),
            description: None,
        });
    }
    if order.status == OrderStatus::Delivered {
        events.push(TrackingEvent {
            timestamp: order.updated_at,
            status: "Delivered".to_string(),
            location: order.shipping_city.clone(),
            description: None,
        });
    }

    TrackingInfo {
        order_id: order.id,
        order_number: order.order_number.clone(),
        tracking_number: format!("TRACK-{}", order.order_number),
        status: order.status.label().to_string(),
        estimated_delivery: format!("Within {}", STANDARD_ESTIMATE),
        carrier: None,
        events,
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShippingQuoteRequest {
    pub city: Option<String>,
    pub state: String,
    /// Parcel weight in kilograms, 1 when omitted
    #[schema(value_type = Option<String>)]
    pub weight_kg: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ShippingQuote {
    #[schema(value_type = Object)]
    pub shipping_cost: StoreMoney,
    pub estimated_days: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ShippingRate {
    pub name: String,
    #[schema(value_type = Object)]
    pub cost: StoreMoney,
    pub duration: String,
    pub description: String,
}

/// Shipping option offered at checkout
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ShippingMethodView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub cost: StoreMoney,
    pub estimated_delivery: String,
}

impl TryFrom<shipping_method::Model> for ShippingMethodView {
    type Error = ServiceError;

    fn try_from(method: shipping_method::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            cost: method.cost()?,
            estimated_delivery: method.duration_display(),
            id: method.id,
            name: method.name,
            description: method.description,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateShipmentInput {
    pub order_id: Uuid,
    pub shipping_method_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub carrier: Option<String>,
    #[validate(length(min = 4, max = 64))]
    pub tracking_number: Option<String>,
    pub estimated_delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateShipmentStatusInput {
    pub status: ShipmentStatus,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrackingEvent {
    pub timestamp: DateTime<Utc>,
    pub status: String,
    pub location: String,
    pub description: Option<String>,
}

impl From<shipment_tracking::Model> for TrackingEvent {
    fn from(entry: shipment_tracking::Model) -> Self {
        Self {
            timestamp: entry.timestamp,
            status: entry.status,
            location: entry.location,
            description: Some(entry.description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrackingInfo {
    pub order_id: Uuid,
    pub order_number: String,
    pub tracking_number: String,
    pub status: String,
    pub estimated_delivery: String,
    pub carrier: Option<String>,
    pub events: Vec<TrackingEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::OrderPaymentStatus;
    use rstest::rstest;

    #[rstest]
    #[case("Lagos", dec!(1), dec!(2000))]
    #[case("Abuja", dec!(5), dec!(2000))]
    #[case("Kano", dec!(1), dec!(3000))]
    #[case("Port Harcourt", dec!(12), dec!(3000))]
    #[case("Enugu", dec!(10), dec!(4000))]
    #[case("Lagos", dec!(5.5), dec!(2500))]
    fn quote_by_state_and_weight(
        #[case] state: &str,
        #[case] weight: Decimal,
        #[case] expected: Decimal,
    ) {
        assert_eq!(quote(state, weight).amount(), expected);
    }

    #[test]
    fn default_rate_card_has_three_tiers() {
        let rates = default_rates();
        assert_eq!(rates.len(), 3);
        assert_eq!(rates[1].cost.amount(), dec!(5000));
        assert_eq!(rates[2].duration, "Same day");
    }

    fn order(status: OrderStatus, payment_status: OrderPaymentStatus, method: PaymentMethod) -> order::Model {
        let now = Utc::now();
        order::Model {
            id: Uuid::new_v4(),
            order_number: "ORD-ABCDEF012345".into(),
            user_id: Uuid::new_v4(),
            status,
            payment_status,
            payment_method: method,
            subtotal: dec!(1000),
            shipping_amount: dec!(2000),
            total_amount: dec!(3000),
            currency: "NGN".into(),
            shipping_method_id: None,
            contact_email: None,
            shipping_first_name: "Ada".into(),
            shipping_last_name: "Obi".into(),
            shipping_address: "1 Broad St".into(),
            shipping_city: "Ibadan".into(),
            shipping_state: "Oyo".into(),
            shipping_postal_code: String::new(),
            shipping_phone: "0803".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unpaid_gateway_orders_cannot_ship() {
        use OrderPaymentStatus as P;
        assert!(!is_shippable(&order(OrderStatus::Pending, P::Pending, PaymentMethod::Paystack)));
        assert!(is_shippable(&order(OrderStatus::Paid, P::Completed, PaymentMethod::Paystack)));
        assert!(is_shippable(&order(OrderStatus::Processing, P::Pending, PaymentMethod::CashOnDelivery)));
        assert!(!is_shippable(&order(OrderStatus::Cancelled, P::Pending, PaymentMethod::CashOnDelivery)));
    }

    #[test]
    fn synthesized_timeline_follows_order_status() {
        let placed = synthesized_tracking(&order(
            OrderStatus::Paid,
            OrderPaymentStatus::Completed,
            PaymentMethod::Paystack,
        ));
        assert_eq!(placed.tracking_number, "TRACK-ORD-ABCDEF012345");
        assert_eq!(placed.events.len(), 2);

        let delivered = synthesized_tracking(&order(
            OrderStatus::Delivered,
            OrderPaymentStatus::Completed,
            PaymentMethod::Paystack,
        ));
        let statuses: Vec<&str> = delivered.events.iter().map(|e| e.status.as_str()).collect();
        assert_eq!(statuses, ["Order Placed", "Processing", "Shipped", "Delivered"]);
        assert_eq!(delivered.events[3].location, "Ibadan");
    }
}
