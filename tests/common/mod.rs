#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use chrono::Utc;
use partstore_api::{
    auth::{ADMIN_TOKEN_HEADER, CallerIdentity, USER_ID_HEADER},
    config::AppConfig,
    db::{self, DbConfig},
    entities::{
        bank_account,
        commerce::{customer_profile, part, Part},
        shipping_method,
    },
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        commerce::{
            catalog_service::{CreateCategoryInput, CreateManufacturerInput, CreatePartInput},
            AddToCartInput, PlaceOrderRequest, PlacedOrder,
        },
        payment_gateway::PaystackGateway,
    },
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Application state and router backed by a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    category_id: Uuid,
    manufacturer_id: Uuid,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Build the app after letting the test adjust configuration, e.g. to
    /// point the gateway at a mock server.
    pub async fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.admin_api_token = Some(ADMIN_TOKEN.to_string());
        cfg.public_base_url = "http://shop.test".to_string();
        customize(&mut cfg);

        let pool = db::establish_connection_with_config(&DbConfig {
            url: cfg.database_url.clone(),
            ..DbConfig::default()
        })
        .await
        .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let cfg = Arc::new(cfg);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(PaystackGateway::from_config(&cfg).expect("gateway client"));
        let services =
            AppServices::new(db_arc.clone(), event_sender.clone(), cfg.clone(), gateway);

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let category = state
            .services
            .catalog
            .create_category(CreateCategoryInput {
                name: "Brakes".to_string(),
                slug: "brakes".to_string(),
                parent_id: None,
            })
            .await
            .expect("seed category");
        let manufacturer = state
            .services
            .catalog
            .create_manufacturer(CreateManufacturerInput {
                name: "Bosch".to_string(),
                slug: "bosch".to_string(),
                logo_url: None,
            })
            .await
            .expect("seed manufacturer");

        Self {
            router: partstore_api::build_router(state.clone()),
            state,
            category_id: category.id,
            manufacturer_id: manufacturer.id,
            _event_task: event_task,
        }
    }

    pub fn category_id(&self) -> Uuid {
        self.category_id
    }

    pub fn manufacturer_id(&self) -> Uuid {
        self.manufacturer_id
    }

    /// Adds an active part under the seeded category and manufacturer.
    pub async fn seed_part(&self, name: &str, price: Decimal, stock: i32) -> part::Model {
        let slug = name.to_lowercase().replace(' ', "-");
        self.state
            .services
            .catalog
            .create_part(CreatePartInput::new(
                name,
                slug,
                price,
                stock,
                self.category_id,
                self.manufacturer_id,
            ))
            .await
            .expect("seed part for tests")
    }

    pub async fn part(&self, part_id: Uuid) -> part::Model {
        Part::find_by_id(part_id)
            .one(&*self.state.db)
            .await
            .expect("load part")
            .expect("part exists")
    }

    pub async fn seed_shipping_method(&self, name: &str, cost: Decimal) -> shipping_method::Model {
        let now = Utc::now();
        shipping_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(format!("{} delivery", name)),
            base_cost: Set(cost),
            currency: Set("NGN".to_string()),
            estimated_days_min: Set(3),
            estimated_days_max: Set(5),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed shipping method")
    }

    pub async fn seed_bank_account(&self, bank_name: &str, is_active: bool) -> bank_account::Model {
        let now = Utc::now();
        bank_account::ActiveModel {
            id: Set(Uuid::new_v4()),
            bank_name: Set(bank_name.to_string()),
            account_name: Set("Parts Store Ltd".to_string()),
            account_number: Set("0123456789".to_string()),
            sort_code: Set(None),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed bank account")
    }

    pub async fn seed_profile(&self, user_id: Uuid, email: Option<&str>) -> customer_profile::Model {
        customer_profile::ActiveModel {
            user_id: Set(user_id),
            email: Set(email.map(str::to_string)),
            address: Set("4 Allen Avenue".to_string()),
            city: Set("Ikeja".to_string()),
            state: Set("Lagos".to_string()),
            postal_code: Set("100271".to_string()),
            phone: Set("08030000000".to_string()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed customer profile")
    }

    pub async fn add_to_cart(&self, caller: &CallerIdentity, part_id: Uuid, quantity: i32) {
        self.state
            .services
            .cart
            .add_item(caller, AddToCartInput { part_id, quantity })
            .await
            .expect("add to cart");
    }

    /// Puts one unit of a fresh part in the buyer's cart and checks out.
    pub async fn place_order_for(
        &self,
        buyer: &CallerIdentity,
        price: Decimal,
        request: PlaceOrderRequest,
    ) -> PlacedOrder {
        let part = self
            .seed_part(&format!("Part {}", Uuid::new_v4().simple()), price, 10)
            .await;
        self.add_to_cart(buyer, part.id, 1).await;
        self.state
            .services
            .checkout
            .place_order(buyer, request)
            .await
            .expect("place order")
    }

    /// Send a request through the full middleware stack.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_as_user(
        &self,
        user_id: Uuid,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let user = user_id.to_string();
        self.request(method, uri, body, &[(USER_ID_HEADER, user.as_str())])
            .await
    }

    pub async fn request_as_admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, &[(ADMIN_TOKEN_HEADER, ADMIN_TOKEN)])
            .await
    }

    /// Send raw bytes, as a gateway webhook delivery does.
    pub async fn post_raw(
        &self,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::from(body)).expect("failed to build request"))
            .await
            .expect("router error during test request")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// A checkout form with a complete delivery address.
pub fn delivery_form() -> PlaceOrderRequest {
    PlaceOrderRequest {
        first_name: "Ada".to_string(),
        last_name: "Obi".to_string(),
        phone: "08031234567".to_string(),
        email: Some("ada@example.com".to_string()),
        address: Some("12 Marina Road".to_string()),
        city: Some("Lagos Island".to_string()),
        state: Some("Lagos".to_string()),
        postal_code: Some("101001".to_string()),
        ..Default::default()
    }
}

pub fn buyer() -> CallerIdentity {
    CallerIdentity::user(Uuid::new_v4())
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
