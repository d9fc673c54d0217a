//! Parts Store API
//!
//! Storefront backend for an auto-parts shop: catalog browsing, carts,
//! checkout, payment reconciliation and shipment tracking.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod money;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    http::HeaderValue,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: Arc<events::EventSender>,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`.
pub fn api_v1_routes(state: &AppState) -> Router<AppState> {
    // Signature-verified, carries no caller identity
    let payment_callback = Router::new().route(
        "/payments/callback",
        post(handlers::payment_webhooks::payment_callback),
    );

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Catalog
        .merge(handlers::commerce::catalog_routes())
        // Cart and checkout
        .nest("/cart", handlers::commerce::carts_routes())
        .nest("/checkout", handlers::commerce::checkout_routes())
        // Orders and tracking
        .nest("/orders", handlers::orders::orders_routes())
        // Payments
        .nest("/payments", handlers::payments::payment_routes())
        .merge(payment_callback)
        // Shipping quotes
        .nest("/shipping", handlers::shipping::shipping_routes())
        // Admin
        .nest("/admin", handlers::admin::admin_routes(state))
}

/// Full application router: API, Swagger UI and the shared middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors_layer = cors_layer(&state.config);

    Router::<AppState>::new()
        .route("/", get(|| async { "partstore-api up" }))
        .nest("/api/v1", api_v1_routes(&state))
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn(auth::identity_middleware))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(CompressionLayer::new())
        .layer(cors_layer)
        // Ensure every request carries a request id for traceability
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

fn cors_layer(cfg: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        ::tracing::info!("No CORS origins configured; allowing any origin");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "partstore-api",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
