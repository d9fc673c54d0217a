pub mod admin;
pub mod commerce;
pub mod common;
pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod shipping;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::payment_gateway::PaymentGateway;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<crate::services::commerce::CatalogService>,
    pub cart: Arc<crate::services::commerce::CartService>,
    pub checkout: Arc<crate::services::commerce::CheckoutService>,
    pub orders: Arc<crate::services::orders::OrderService>,
    pub payments: Arc<crate::services::payments::PaymentService>,
    pub shipping: Arc<crate::services::shipments::ShippingService>,
}

impl AppServices {
    /// Wire every service against one connection pool and event channel.
    /// The gateway is injected so tests can point it at a fake server.
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let catalog = Arc::new(crate::services::commerce::CatalogService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let cart = Arc::new(crate::services::commerce::CartService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let checkout = Arc::new(crate::services::commerce::CheckoutService::new(
            db.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let orders = Arc::new(crate::services::orders::OrderService::new(db.clone()));
        let payments = Arc::new(crate::services::payments::PaymentService::new(
            db.clone(),
            event_sender.clone(),
            gateway,
            config,
        ));
        let shipping = Arc::new(crate::services::shipments::ShippingService::new(
            db,
            event_sender,
        ));

        Self {
            catalog,
            cart,
            checkout,
            orders,
            payments,
            shipping,
        }
    }
}
