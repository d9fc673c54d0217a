use crate::{
    auth::CallerIdentity,
    config::AppConfig,
    entities::{
        commerce::{cart_item, part, CartItem, CustomerProfile, Part},
        order::{self, OrderPaymentStatus, OrderStatus},
        order_item,
        payment::PaymentMethod,
        shipping_method, ShippingMethod,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::StoreMoney,
    services::{
        commerce::cart_service::{find_cart, load_cart_lines, CartLine, CartView},
        orders::OrderDetails,
        shipments::{active_shipping_methods, ShippingMethodView},
    },
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Turns a cart into an order.
///
/// Order creation, the price snapshot, the stock decrements and emptying
/// the cart commit together or not at all. Each stock decrement is a
/// conditional update that only succeeds while enough stock remains, so two
/// buyers racing for the last unit cannot both win: the loser's update
/// matches no row and its whole transaction is rolled back.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// What the checkout page shows before the buyer commits.
    #[instrument(skip(self))]
    pub async fn checkout_summary(
        &self,
        caller: &CallerIdentity,
    ) -> Result<CheckoutSummary, ServiceError> {
        let user_id = caller.require_user()?;
        let cart = self.non_empty_cart(caller).await?;

        let (_, shipping_amount) = self.resolve_shipping(None).await?;
        let shipping_methods = active_shipping_methods(&*self.db)
            .await?
            .into_iter()
            .map(ShippingMethodView::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let saved_address = CustomerProfile::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .filter(|profile| profile.has_delivery_address())
            .map(|profile| SavedAddress {
                address: profile.address,
                city: profile.city,
                state: profile.state,
                postal_code: profile.postal_code,
                phone: profile.phone,
            });

        Ok(CheckoutSummary {
            subtotal: cart.total_price,
            total: cart.total_price + shipping_amount,
            shipping_amount,
            cart,
            shipping_methods,
            saved_address,
        })
    }

    /// Places an order from the caller's cart.
    ///
    /// # Returns
    ///
    /// * `Ok(PlacedOrder)` - The order and what the buyer does next
    /// * `Err(ServiceError::InvalidOperation)` - The cart is empty
    /// * `Err(ServiceError::InsufficientStock)` - Some line no longer fits in
    ///   stock; the message names every such line and nothing is written
    /// * `Err(ServiceError::NotFound)` - The chosen shipping method is
    ///   unknown or inactive
    #[instrument(skip(self, request), fields(payment_method = ?request.payment_method))]
    pub async fn place_order(
        &self,
        caller: &CallerIdentity,
        request: PlaceOrderRequest,
    ) -> Result<PlacedOrder, ServiceError> {
        let user_id = caller.require_user()?;
        request.validate()?;

        let cart = self.non_empty_cart(caller).await?;

        let short: Vec<&CartLine> = cart.items.iter().filter(|l| l.exceeds_stock()).collect();
        if !short.is_empty() {
            counter!("partstore.checkout.failures", 1, "reason" => "stock");
            return Err(ServiceError::InsufficientStock(describe_shortfall(&short)));
        }

        let (shipping_method_id, shipping_amount) =
            self.resolve_shipping(request.shipping_method_id).await?;
        let (address, contact_email) = self.resolve_address(user_id, &request).await?;

        let subtotal = cart.total_price;
        let total = subtotal + shipping_amount;
        let status = match request.payment_method {
            PaymentMethod::CashOnDelivery => OrderStatus::Processing,
            PaymentMethod::Paystack | PaymentMethod::BankTransfer => OrderStatus::Pending,
        };

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            user_id: Set(user_id),
            status: Set(status),
            payment_status: Set(OrderPaymentStatus::Pending),
            payment_method: Set(request.payment_method),
            subtotal: Set(subtotal.amount()),
            shipping_amount: Set(shipping_amount.amount()),
            total_amount: Set(total.amount()),
            currency: Set(total.currency_code().to_string()),
            shipping_method_id: Set(shipping_method_id),
            contact_email: Set(contact_email),
            shipping_first_name: Set(request.first_name.trim().to_string()),
            shipping_last_name: Set(request.last_name.trim().to_string()),
            shipping_address: Set(address.address),
            shipping_city: Set(address.city),
            shipping_state: Set(address.state),
            shipping_postal_code: Set(address.postal_code),
            shipping_phone: Set(address.phone),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                part_id: Set(line.part_id),
                part_name: Set(line.part_name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price.amount()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            items.push(item);

            let decremented = Part::update_many()
                .col_expr(
                    part::Column::StockQuantity,
                    Expr::col(part::Column::StockQuantity).sub(line.quantity),
                )
                .col_expr(part::Column::UpdatedAt, Expr::value(now))
                .filter(part::Column::Id.eq(line.part_id))
                .filter(part::Column::StockQuantity.gte(line.quantity))
                .exec(&txn)
                .await?;

            if decremented.rows_affected != 1 {
                let available = Part::find_by_id(line.part_id)
                    .one(&txn)
                    .await?
                    .map_or(0, |part| part.stock_quantity);
                txn.rollback().await?;
                warn!(part_id = %line.part_id, available, "stock changed during checkout, rolled back");
                counter!("partstore.checkout.failures", 1, "reason" => "stock_race");
                return Err(ServiceError::InsufficientStock(format!(
                    "Insufficient stock for: {}",
                    shortfall_entry(&line.part_name, line.quantity, available)
                )));
            }
        }

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.cart_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        counter!(
            "partstore.checkout.orders_placed",
            1,
            "payment_method" => payment_method_label(request.payment_method)
        );
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %total,
            "order placed"
        );

        self.event_sender
            .send_or_log(Event::OrderPlaced {
                order_id: order.id,
                order_number: order.order_number.clone(),
                total: total.amount(),
                payment_method: payment_method_label(request.payment_method).to_string(),
            })
            .await;
        self.event_sender
            .send_or_log(Event::CartCleared(cart.cart_id))
            .await;

        let next_step = NextStep::for_method(request.payment_method, order.id);
        Ok(PlacedOrder {
            order: OrderDetails::from_parts(order, items)?,
            next_step,
        })
    }

    async fn non_empty_cart(&self, caller: &CallerIdentity) -> Result<CartView, ServiceError> {
        let cart = find_cart(&*self.db, caller)
            .await?
            .ok_or_else(|| ServiceError::InvalidOperation("Your cart is empty".to_string()))?;
        let view = CartView::from_lines(cart.id, load_cart_lines(&*self.db, cart.id).await?);
        if view.is_empty() {
            return Err(ServiceError::InvalidOperation(
                "Your cart is empty".to_string(),
            ));
        }
        Ok(view)
    }

    /// Selected method, else the oldest active method, else the configured
    /// flat rate.
    async fn resolve_shipping(
        &self,
        selected: Option<Uuid>,
    ) -> Result<(Option<Uuid>, StoreMoney), ServiceError> {
        if let Some(method_id) = selected {
            let method = ShippingMethod::find_by_id(method_id)
                .filter(shipping_method::Column::IsActive.eq(true))
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound("Invalid shipping method selected".to_string())
                })?;
            return Ok((Some(method.id), method.cost()?));
        }

        match active_shipping_methods(&*self.db).await?.into_iter().next() {
            Some(method) => Ok((Some(method.id), method.cost()?)),
            None => Ok((None, StoreMoney::new(self.config.default_shipping_cost))),
        }
    }

    async fn resolve_address(
        &self,
        user_id: Uuid,
        request: &PlaceOrderRequest,
    ) -> Result<(DeliveryAddress, Option<String>), ServiceError> {
        let profile = CustomerProfile::find_by_id(user_id).one(&*self.db).await?;
        let contact_email = non_blank(request.email.as_deref())
            .or_else(|| profile.as_ref().and_then(|p| non_blank(p.email.as_deref())));

        let address = if request.use_profile_address {
            let profile = profile
                .filter(|p| p.has_delivery_address())
                .ok_or_else(|| {
                    ServiceError::ValidationError(
                        "No saved delivery address on your profile".to_string(),
                    )
                })?;
            DeliveryAddress {
                phone: non_blank(Some(&request.phone)).unwrap_or(profile.phone),
                address: profile.address,
                city: profile.city,
                state: profile.state,
                postal_code: profile.postal_code,
            }
        } else {
            DeliveryAddress::from_form(request)?
        };

        Ok((address, contact_email))
    }
}

/// `ORD-` followed by 12 upper-case hex digits of a fresh v4 UUID.
pub fn generate_order_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", hex[..12].to_uppercase())
}

pub(crate) fn payment_method_label(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Paystack => "paystack",
        PaymentMethod::BankTransfer => "bank_transfer",
        PaymentMethod::CashOnDelivery => "cash_on_delivery",
    }
}

fn describe_shortfall(lines: &[&CartLine]) -> String {
    let parts: Vec<String> = lines
        .iter()
        .map(|l| shortfall_entry(&l.part_name, l.quantity, l.stock_available))
        .collect();
    format!("Insufficient stock for: {}", parts.join(", "))
}

fn shortfall_entry(part_name: &str, requested: i32, available: i32) -> String {
    format!("{} (requested {}, available {})", part_name, requested, available)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

struct DeliveryAddress {
    address: String,
    city: String,
    state: String,
    postal_code: String,
    phone: String,
}

impl DeliveryAddress {
    fn from_form(request: &PlaceOrderRequest) -> Result<Self, ServiceError> {
        let address = non_blank(request.address.as_deref());
        let city = non_blank(request.city.as_deref());
        let state = non_blank(request.state.as_deref());

        let mut missing = Vec::new();
        if address.is_none() {
            missing.push("address");
        }
        if city.is_none() {
            missing.push("city");
        }
        if state.is_none() {
            missing.push("state");
        }

        match (address, city, state) {
            (Some(address), Some(city), Some(state)) => Ok(Self {
                address,
                city,
                state,
                postal_code: non_blank(request.postal_code.as_deref()).unwrap_or_default(),
                phone: request.phone.trim().to_string(),
            }),
            _ => Err(ServiceError::ValidationError(format!(
                "Missing delivery fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Checkout form submission
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub shipping_method_id: Option<Uuid>,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 1, max = 20))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    /// Ship to the address saved on the buyer's profile
    #[serde(default)]
    pub use_profile_address: bool,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// Where the buyer goes after the order exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NextStep {
    /// Open the hosted gateway checkout for this order
    InitiateGatewayPayment { order_id: Uuid },
    /// Show bank details and wait for the buyer's transfer
    BankTransfer { order_id: Uuid },
    /// Nothing to pay online; the order is already processing
    Confirmed { order_id: Uuid },
}

impl NextStep {
    pub fn for_method(method: PaymentMethod, order_id: Uuid) -> Self {
        match method {
            PaymentMethod::Paystack => Self::InitiateGatewayPayment { order_id },
            PaymentMethod::BankTransfer => Self::BankTransfer { order_id },
            PaymentMethod::CashOnDelivery => Self::Confirmed { order_id },
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlacedOrder {
    pub order: OrderDetails,
    pub next_step: NextStep,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SavedAddress {
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutSummary {
    pub cart: CartView,
    #[schema(value_type = Object)]
    pub subtotal: StoreMoney,
    #[schema(value_type = Object)]
    pub shipping_amount: StoreMoney,
    #[schema(value_type = Object)]
    pub total: StoreMoney,
    pub shipping_methods: Vec<ShippingMethodView>,
    pub saved_address: Option<SavedAddress>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_numbers_are_prefixed_upper_hex() {
        let number = generate_order_number();
        assert_eq!(number.len(), 16);
        assert!(number.starts_with("ORD-"));
        assert!(number[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(number, generate_order_number());
    }

    #[test]
    fn next_step_follows_payment_method() {
        let id = Uuid::new_v4();
        assert_eq!(
            NextStep::for_method(PaymentMethod::Paystack, id),
            NextStep::InitiateGatewayPayment { order_id: id }
        );
        assert_eq!(
            NextStep::for_method(PaymentMethod::CashOnDelivery, id),
            NextStep::Confirmed { order_id: id }
        );
        let json = serde_json::to_value(NextStep::BankTransfer { order_id: id }).unwrap();
        assert_eq!(json["action"], "bank_transfer");
    }

    #[test]
    fn form_address_reports_missing_fields() {
        let request = PlaceOrderRequest {
            first_name: "Ada".into(),
            last_name: "Obi".into(),
            phone: "0803".into(),
            address: Some("12 Marina".into()),
            city: Some("  ".into()),
            ..Default::default()
        };
        let err = DeliveryAddress::from_form(&request).err().unwrap();
        assert!(matches!(err, ServiceError::ValidationError(ref m) if m == "Missing delivery fields: city, state"));
    }

    #[test]
    fn request_defaults_to_gateway_payment() {
        let request: PlaceOrderRequest = serde_json::from_value(serde_json::json!({
            "first_name": "Ada",
            "last_name": "Obi",
            "phone": "0803"
        }))
        .unwrap();
        assert_eq!(request.payment_method, PaymentMethod::Paystack);
        assert!(!request.use_profile_address);
        assert!(request.validate().is_ok());
    }
}
