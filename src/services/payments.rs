use crate::{
    auth::CallerIdentity,
    config::AppConfig,
    entities::{
        bank_account,
        order::{self, OrderPaymentStatus, OrderStatus},
        payment::{self, PaymentMethod, PaymentStatus},
        BankAccount, Order, Payment,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::StoreMoney,
    services::{
        commerce::checkout_service::payment_method_label,
        orders::find_owned_order,
        payment_gateway::{transaction_id_text, verify_webhook_signature, PaymentGateway},
    },
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const ALREADY_PAID: &str = "This order has already been paid for.";
const SUCCESS_EVENT: &str = "charge.success";

/// Payment attempts against orders and their reconciliation with the
/// gateway.
///
/// Gateway payments are settled by machine: the webhook or an explicit
/// verification call. Bank transfers are settled only when staff confirm
/// the money arrived; the buyer's own confirmation just parks the order as
/// pending.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<AppConfig>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            config,
        }
    }

    /// Opens a gateway payment for the order and returns what the hosted
    /// checkout popup needs.
    #[instrument(skip(self))]
    pub async fn initiate_payment(
        &self,
        caller: &CallerIdentity,
        order_id: Uuid,
    ) -> Result<PaymentInitiation, ServiceError> {
        let user_id = caller.require_user()?;
        let order = find_owned_order(&*self.db, user_id, order_id).await?;
        if order.is_paid() {
            return Err(ServiceError::InvalidOperation(ALREADY_PAID.to_string()));
        }

        let email = order.contact_email.clone().ok_or_else(|| {
            ServiceError::ValidationError(
                "An e-mail address is required to pay online".to_string(),
            )
        })?;

        let amount = order.total_money()?;
        let payment = self
            .open_payment(&order, PaymentMethod::Paystack, "PAY")
            .await?;

        Ok(PaymentInitiation {
            public_key: self.gateway.public_key().map(str::to_string),
            amount_minor: amount.to_minor_units()?,
            currency: amount.currency_code().to_string(),
            callback_url: self.config.payment_verify_url(&payment.reference),
            reference: payment.reference,
            amount,
            email,
            order_number: order.order_number,
        })
    }

    /// Bank details for paying the order by transfer. The order's open
    /// transfer attempt is reused so the buyer always quotes one reference.
    #[instrument(skip(self))]
    pub async fn bank_transfer(
        &self,
        caller: &CallerIdentity,
        order_id: Uuid,
    ) -> Result<BankTransferInstructions, ServiceError> {
        let user_id = caller.require_user()?;
        let order = find_owned_order(&*self.db, user_id, order_id).await?;
        if order.is_paid() {
            return Err(ServiceError::InvalidOperation(ALREADY_PAID.to_string()));
        }

        let existing = Payment::find()
            .filter(payment::Column::OrderId.eq(order.id))
            .filter(payment::Column::PaymentMethod.eq(PaymentMethod::BankTransfer))
            .filter(payment::Column::Status.eq(PaymentStatus::Pending))
            .order_by_desc(payment::Column::CreatedAt)
            .one(&*self.db)
            .await?;

        let payment = match existing {
            Some(payment) => payment,
            None => {
                self.open_payment(&order, PaymentMethod::BankTransfer, "BANK")
                    .await?
            }
        };

        let accounts = BankAccount::find()
            .filter(bank_account::Column::IsActive.eq(true))
            .order_by_asc(bank_account::Column::BankName)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(BankAccountDetails::from)
            .collect();

        Ok(BankTransferInstructions {
            order_id: order.id,
            order_number: order.order_number.clone(),
            amount: payment.amount_money()?,
            reference: payment.reference,
            accounts,
        })
    }

    /// The buyer says the transfer has been made. Order and payment go back
    /// to pending until staff confirm receipt.
    #[instrument(skip(self))]
    pub async fn confirm_transfer(
        &self,
        caller: &CallerIdentity,
        order_id: Uuid,
    ) -> Result<TransferConfirmation, ServiceError> {
        let user_id = caller.require_user()?;
        let order = find_owned_order(&*self.db, user_id, order_id).await?;

        let payment = Payment::find()
            .filter(payment::Column::OrderId.eq(order.id))
            .filter(payment::Column::PaymentMethod.eq(PaymentMethod::BankTransfer))
            .order_by_desc(payment::Column::CreatedAt)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound("No bank transfer was started for this order".to_string())
            })?;

        if order.is_paid() || payment.status == PaymentStatus::Completed {
            return Err(ServiceError::InvalidOperation(ALREADY_PAID.to_string()));
        }
        if !payment.status.can_transition_to(PaymentStatus::Pending) {
            return Err(ServiceError::InvalidStatus(format!(
                "Payment {} can no longer be confirmed",
                payment.reference
            )));
        }

        let now = Utc::now();
        let reference = payment.reference.clone();
        let old_status = order.status;
        let txn = self.db.begin().await?;

        let mut active_payment: payment::ActiveModel = payment.into();
        active_payment.status = Set(PaymentStatus::Pending);
        active_payment.updated_at = Set(now);
        active_payment.update(&txn).await?;

        let mut active_order: order::ActiveModel = order.into();
        active_order.status = Set(OrderStatus::Pending);
        active_order.payment_status = Set(OrderPaymentStatus::Pending);
        active_order.updated_at = Set(now);
        let order = active_order.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::BankTransferSubmitted {
                order_id: order.id,
                reference: reference.clone(),
            })
            .await;
        if old_status != order.status {
            self.event_sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id: order.id,
                    old_status: old_status.label().to_string(),
                    new_status: order.status.label().to_string(),
                })
                .await;
        }

        info!(order_id = %order.id, %reference, "bank transfer awaiting confirmation");
        Ok(TransferConfirmation {
            order_id: order.id,
            reference,
            order_status: order.status,
            payment_status: PaymentStatus::Pending,
        })
    }

    /// Staff confirmation that a bank transfer arrived.
    #[instrument(skip(self))]
    pub async fn confirm_bank_transfer(
        &self,
        reference: &str,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let payment = self.payment_by_reference(reference).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Payment {} not found", reference))
        })?;

        if payment.payment_method != PaymentMethod::BankTransfer {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment {} is not a bank transfer",
                reference
            )));
        }

        self.reconcile_success(payment, None, None, Settlement::Staff)
            .await
    }

    /// Checks the signature header and decodes the webhook body.
    ///
    /// The signature is only enforced when a gateway secret is configured.
    pub fn parse_webhook(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<Value, ServiceError> {
        if let Some(secret) = self.config.paystack_secret_key.as_deref() {
            let valid = signature
                .map(|sig| verify_webhook_signature(secret, body, sig))
                .unwrap_or(false);
            if !valid {
                warn!("rejected webhook with a missing or invalid signature");
                return Err(ServiceError::Unauthorized(
                    "Invalid webhook signature".to_string(),
                ));
            }
        }

        Ok(serde_json::from_slice(body)?)
    }

    /// Applies a gateway event. Only successful charges change state;
    /// redelivery of an applied event is acknowledged without effect.
    #[instrument(skip(self, payload))]
    pub async fn handle_webhook(&self, payload: &Value) -> Result<WebhookOutcome, ServiceError> {
        let event = payload.get("event").and_then(Value::as_str).unwrap_or_default();
        let data = payload.get("data").cloned().unwrap_or(Value::Null);
        let status = data.get("status").and_then(Value::as_str);

        if event != SUCCESS_EVENT || status != Some("success") {
            info!(event, "ignoring gateway event");
            return Ok(WebhookOutcome::Ignored);
        }

        let reference = data
            .get("reference")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServiceError::InvalidInput("Webhook payload has no reference".to_string())
            })?
            .to_string();

        let Some(payment) = self.payment_by_reference(&reference).await? else {
            warn!(%reference, "webhook for unknown payment");
            return Ok(WebhookOutcome::PaymentNotFound);
        };

        // Bank transfers and cash payments are only ever settled by staff
        if payment.payment_method != PaymentMethod::Paystack {
            warn!(
                %reference,
                method = payment_method_label(payment.payment_method),
                "gateway event for a payment the gateway does not settle"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let transaction_id = data.get("id").and_then(transaction_id_text);
        let outcome = self
            .reconcile_success(payment, transaction_id, Some(data), Settlement::Gateway)
            .await?;

        Ok(match outcome {
            ReconcileOutcome::Applied => WebhookOutcome::Applied,
            ReconcileOutcome::AlreadyApplied => WebhookOutcome::AlreadyApplied,
        })
    }

    /// Asks the gateway about one of the caller's payments and applies the
    /// answer. Gateway errors leave the payment untouched.
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        caller: &CallerIdentity,
        reference: &str,
    ) -> Result<VerificationResult, ServiceError> {
        let user_id = caller.require_user()?;

        let (payment, order) = Payment::find()
            .filter(payment::Column::Reference.eq(reference))
            .find_also_related(Order)
            .one(&*self.db)
            .await?
            .and_then(|(payment, order)| order.map(|order| (payment, order)))
            .filter(|(_, order)| order.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", reference)))?;

        if payment.payment_method != PaymentMethod::Paystack {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment {} is not a card payment and cannot be verified with the gateway",
                reference
            )));
        }

        if payment.status == PaymentStatus::Completed {
            return Ok(VerificationResult::from_models(&payment, &order, true));
        }

        let verification = self.gateway.verify_transaction(reference).await?;

        if verification.succeeded {
            self.reconcile_success(
                payment,
                verification.transaction_id,
                Some(verification.raw),
                Settlement::Gateway,
            )
            .await?;
        } else {
            self.mark_failed(payment, verification.raw).await?;
        }

        let (payment, order) = self.reload(reference).await?;
        Ok(VerificationResult::from_models(
            &payment,
            &order,
            payment.status == PaymentStatus::Completed,
        ))
    }

    async fn open_payment(
        &self,
        order: &order::Model,
        method: PaymentMethod,
        prefix: &str,
    ) -> Result<payment::Model, ServiceError> {
        let now = Utc::now();
        let reference = generate_reference(prefix, &order.order_number);

        let payment = payment::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            reference: Set(reference),
            amount: Set(order.total_amount),
            currency: Set(order.currency.clone()),
            payment_method: Set(method),
            status: Set(PaymentStatus::Pending),
            gateway_response: Set(None),
            transaction_id: Set(None),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        counter!("partstore.payments.initiated", 1, "method" => payment_method_label(method));
        self.event_sender
            .send_or_log(Event::PaymentInitiated {
                payment_id: payment.id,
                order_id: order.id,
                reference: payment.reference.clone(),
            })
            .await;

        info!(order_id = %order.id, reference = %payment.reference, "payment opened");
        Ok(payment)
    }

    /// Marks the payment completed and settles its order in one transaction.
    ///
    /// The payment update only matches while the row is not yet completed,
    /// so of any number of concurrent or repeated deliveries exactly one
    /// applies; the rest report `AlreadyApplied`. Staff may not settle an
    /// order that is already paid; the gateway may, since it has already
    /// captured the money.
    async fn reconcile_success(
        &self,
        payment: payment::Model,
        transaction_id: Option<String>,
        raw: Option<Value>,
        settlement: Settlement,
    ) -> Result<ReconcileOutcome, ServiceError> {
        if payment.status == PaymentStatus::Completed {
            counter!("partstore.payments.reconciled", 1, "outcome" => "already_applied");
            return Ok(ReconcileOutcome::AlreadyApplied);
        }
        if !payment.status.can_transition_to(PaymentStatus::Completed) {
            return Err(ServiceError::InvalidStatus(format!(
                "Payment {} cannot be completed from its current state",
                payment.reference
            )));
        }

        let now = Utc::now();
        let mut changes = payment::ActiveModel {
            status: Set(PaymentStatus::Completed),
            paid_at: Set(Some(now)),
            updated_at: Set(now),
            ..Default::default()
        };
        if transaction_id.is_some() {
            changes.transaction_id = Set(transaction_id);
        }
        if raw.is_some() {
            changes.gateway_response = Set(raw);
        }

        let txn = self.db.begin().await?;

        let order = Order::find_by_id(payment.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", payment.order_id)))?;

        if settlement == Settlement::Staff && order.is_paid() {
            txn.rollback().await?;
            warn!(
                order_id = %order.id,
                reference = %payment.reference,
                "refusing to confirm a transfer for an order that is already paid"
            );
            return Err(ServiceError::InvalidOperation(ALREADY_PAID.to_string()));
        }

        let applied = Payment::update_many()
            .set(changes)
            .filter(payment::Column::Reference.eq(payment.reference.as_str()))
            .filter(payment::Column::Status.ne(PaymentStatus::Completed))
            .exec(&txn)
            .await?;

        if applied.rows_affected == 0 {
            txn.rollback().await?;
            counter!("partstore.payments.reconciled", 1, "outcome" => "already_applied");
            return Ok(ReconcileOutcome::AlreadyApplied);
        }

        let old_status = order.status;
        let mut new_status = old_status;

        if order.is_paid() {
            warn!(
                order_id = %order.id,
                reference = %payment.reference,
                "order was already settled by another payment; recording duplicate settlement"
            );
        } else {
            if old_status == OrderStatus::Pending {
                new_status = OrderStatus::Paid;
            } else {
                info!(order_id = %order.id, status = ?old_status, "payment settled; order status left as is");
            }
            let mut active: order::ActiveModel = order.into();
            active.status = Set(new_status);
            active.payment_status = Set(OrderPaymentStatus::Completed);
            active.payment_method = Set(payment.payment_method);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }

        txn.commit().await?;

        counter!("partstore.payments.reconciled", 1, "outcome" => "completed");
        self.event_sender
            .send_or_log(Event::PaymentCompleted {
                payment_id: payment.id,
                order_id: payment.order_id,
                reference: payment.reference.clone(),
            })
            .await;
        if new_status != old_status {
            self.event_sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id: payment.order_id,
                    old_status: old_status.label().to_string(),
                    new_status: new_status.label().to_string(),
                })
                .await;
        }

        info!(reference = %payment.reference, order_id = %payment.order_id, "payment completed");
        Ok(ReconcileOutcome::Applied)
    }

    /// Records a failed verification. The order is not touched.
    async fn mark_failed(&self, payment: payment::Model, raw: Value) -> Result<(), ServiceError> {
        if !payment.status.can_transition_to(PaymentStatus::Failed) {
            info!(reference = %payment.reference, status = ?payment.status, "not marking payment failed");
            return Ok(());
        }

        let changes = payment::ActiveModel {
            status: Set(PaymentStatus::Failed),
            gateway_response: Set(Some(raw)),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };

        let result = Payment::update_many()
            .set(changes)
            .filter(payment::Column::Reference.eq(payment.reference.as_str()))
            .filter(payment::Column::Status.ne(PaymentStatus::Completed))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            counter!("partstore.payments.reconciled", 1, "outcome" => "failed");
            self.event_sender
                .send_or_log(Event::PaymentFailed {
                    payment_id: payment.id,
                    order_id: payment.order_id,
                    reference: payment.reference.clone(),
                })
                .await;
            warn!(reference = %payment.reference, "gateway reported payment failure");
        }
        Ok(())
    }

    async fn payment_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<payment::Model>, ServiceError> {
        Ok(Payment::find()
            .filter(payment::Column::Reference.eq(reference))
            .one(&*self.db)
            .await?)
    }

    async fn reload(&self, reference: &str) -> Result<(payment::Model, order::Model), ServiceError> {
        Payment::find()
            .filter(payment::Column::Reference.eq(reference))
            .find_also_related(Order)
            .one(&*self.db)
            .await?
            .and_then(|(payment, order)| order.map(|order| (payment, order)))
            .ok_or_else(|| ServiceError::NotFound(format!("Payment {} not found", reference)))
    }
}

/// `{prefix}-{order_number}-{8 upper-case hex}`
pub fn generate_reference(prefix: &str, order_number: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, order_number, hex[..8].to_uppercase())
}

/// Who is settling a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Gateway,
    Staff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied,
    AlreadyApplied,
}

/// What a webhook delivery did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied,
    AlreadyApplied,
    PaymentNotFound,
    Ignored,
}

/// Parameters for the hosted checkout popup
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentInitiation {
    pub public_key: Option<String>,
    pub reference: String,
    #[schema(value_type = Object)]
    pub amount: StoreMoney,
    /// Amount in the currency's minor unit (kobo)
    pub amount_minor: i64,
    pub currency: String,
    pub email: String,
    pub callback_url: String,
    pub order_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BankAccountDetails {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub sort_code: Option<String>,
}

impl From<bank_account::Model> for BankAccountDetails {
    fn from(account: bank_account::Model) -> Self {
        Self {
            bank_name: account.bank_name,
            account_name: account.account_name,
            account_number: account.account_number,
            sort_code: account.sort_code,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BankTransferInstructions {
    pub order_id: Uuid,
    pub order_number: String,
    /// Quote this reference on the transfer
    pub reference: String,
    #[schema(value_type = Object)]
    pub amount: StoreMoney,
    pub accounts: Vec<BankAccountDetails>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferConfirmation {
    pub order_id: Uuid,
    pub reference: String,
    #[schema(value_type = String)]
    pub order_status: OrderStatus,
    #[schema(value_type = String)]
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerificationResult {
    pub verified: bool,
    pub reference: String,
    #[schema(value_type = String)]
    pub payment_status: PaymentStatus,
    pub order_id: Uuid,
    pub order_number: String,
    #[schema(value_type = String)]
    pub order_status: OrderStatus,
    #[schema(value_type = String)]
    pub order_payment_status: OrderPaymentStatus,
}

impl VerificationResult {
    fn from_models(payment: &payment::Model, order: &order::Model, verified: bool) -> Self {
        Self {
            verified,
            reference: payment.reference.clone(),
            payment_status: payment.status,
            order_id: order.id,
            order_number: order.order_number.clone(),
            order_status: order.status,
            order_payment_status: order.payment_status,
        }
    }
}
