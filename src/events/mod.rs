use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Events are notifications; a committed business operation never fails
    /// because one could not be delivered.
    pub async fn send_or_log(&self, event: Event) {
        let kind = event.kind();
        if let Err(e) = self.send(event).await {
            warn!(event = kind, error = %e, "dropping domain event");
        }
    }
}

/// Domain events emitted after the corresponding transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    StockAdjusted {
        part_id: Uuid,
        old_quantity: i32,
        new_quantity: i32,
    },

    // Cart events
    CartItemAdded {
        cart_id: Uuid,
        part_id: Uuid,
        quantity: i32,
    },
    CartItemUpdated {
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        cart_id: Uuid,
        item_id: Uuid,
    },
    CartCleared(Uuid),

    // Order events
    OrderPlaced {
        order_id: Uuid,
        order_number: String,
        total: Decimal,
        payment_method: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },

    // Payment events
    PaymentInitiated {
        payment_id: Uuid,
        order_id: Uuid,
        reference: String,
    },
    PaymentCompleted {
        payment_id: Uuid,
        order_id: Uuid,
        reference: String,
    },
    PaymentFailed {
        payment_id: Uuid,
        order_id: Uuid,
        reference: String,
    },
    BankTransferSubmitted {
        order_id: Uuid,
        reference: String,
    },

    // Shipment events
    ShipmentCreated {
        shipment_id: Uuid,
        order_id: Uuid,
        tracking_number: String,
    },
    ShipmentStatusChanged {
        shipment_id: Uuid,
        old_status: String,
        new_status: String,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Stable name used for logging and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            Event::StockAdjusted { .. } => "stock_adjusted",
            Event::CartItemAdded { .. } => "cart_item_added",
            Event::CartItemUpdated { .. } => "cart_item_updated",
            Event::CartItemRemoved { .. } => "cart_item_removed",
            Event::CartCleared(_) => "cart_cleared",
            Event::OrderPlaced { .. } => "order_placed",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::PaymentInitiated { .. } => "payment_initiated",
            Event::PaymentCompleted { .. } => "payment_completed",
            Event::PaymentFailed { .. } => "payment_failed",
            Event::BankTransferSubmitted { .. } => "bank_transfer_submitted",
            Event::ShipmentCreated { .. } => "shipment_created",
            Event::ShipmentStatusChanged { .. } => "shipment_status_changed",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("partstore.events", 1, "kind" => event.kind());

        match &event {
            Event::OrderPlaced {
                order_id,
                order_number,
                total,
                payment_method,
            } => {
                info!(%order_id, %order_number, %total, %payment_method, "order placed");
            }
            Event::PaymentCompleted {
                order_id, reference, ..
            } => {
                info!(%order_id, %reference, "payment completed");
            }
            Event::PaymentFailed {
                order_id, reference, ..
            } => {
                warn!(%order_id, %reference, "payment failed");
            }
            Event::ShipmentStatusChanged {
                shipment_id,
                old_status,
                new_status,
                ..
            } => {
                info!(%shipment_id, %old_status, %new_status, "shipment status changed");
            }
            other => {
                info!(event = other.kind(), payload = ?other, "domain event");
            }
        }
    }

    info!("Event channel closed; event processing stopped");
}
