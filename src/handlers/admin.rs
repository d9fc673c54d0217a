//! Back-office routes for fulfilment staff and catalog management.
//!
//! Every route here sits behind `admin_token_middleware`; with no
//! `admin_api_token` configured they all answer 403.

use crate::{
    auth::admin_token_middleware,
    entities::{
        commerce::{category, manufacturer, part},
        shipment, shipment_tracking,
    },
    handlers::common::{created, validate_input},
    services::{
        commerce::catalog_service::{CreateCategoryInput, CreateManufacturerInput, CreatePartInput},
        payments::ReconcileOutcome,
        shipments::{CreateShipmentInput, UpdateShipmentStatusInput},
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), crate::errors::ServiceError>;

pub fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/payments/:reference/confirm", post(confirm_bank_transfer))
        .route("/shipments", post(create_shipment))
        .route("/shipments/:id/status", put(update_shipment_status))
        .route("/shipments/:id/tracking", get(shipment_tracking_history))
        .route("/categories", post(create_category))
        .route("/manufacturers", post(create_manufacturer))
        .route("/parts", post(create_part))
        .route("/parts/:id/stock", put(set_stock))
        .layer(middleware::from_fn_with_state(
            state.config.admin_api_token.clone(),
            admin_token_middleware,
        ))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BankTransferConfirmed {
    pub reference: String,
    /// False when the payment had already been confirmed
    pub applied: bool,
}

/// Staff confirmation that a bank transfer was received
#[utoipa::path(
    post,
    path = "/api/v1/admin/payments/{reference}/confirm",
    params(("reference" = String, Path, description = "Bank transfer payment reference")),
    responses(
        (status = 200, description = "Payment settled", body = ApiResponse<BankTransferConfirmed>),
        (status = 401, description = "Invalid admin token", body = crate::errors::ErrorResponse),
        (status = 403, description = "Administrative access disabled", body = crate::errors::ErrorResponse),
        (status = 404, description = "Payment not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Admin"
)]
pub async fn confirm_bank_transfer(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<BankTransferConfirmed> {
    let outcome = state
        .services
        .payments
        .confirm_bank_transfer(&reference)
        .await?;
    Ok(Json(ApiResponse::success(BankTransferConfirmed {
        reference,
        applied: outcome == ReconcileOutcome::Applied,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/shipments",
    request_body = CreateShipmentInput,
    responses(
        (status = 201, description = "Shipment created"),
        (status = 400, description = "Order not ready to ship", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already has a shipment", body = crate::errors::ErrorResponse),
    ),
    tag = "Admin"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    Json(payload): Json<CreateShipmentInput>,
) -> Created<shipment::Model> {
    validate_input(&payload)?;
    let shipment = state.services.shipping.create_shipment(payload).await?;
    Ok(created(shipment))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/shipments/{id}/status",
    params(("id" = Uuid, Path, description = "Shipment id")),
    request_body = UpdateShipmentStatusInput,
    responses(
        (status = 200, description = "Status advanced"),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Admin"
)]
pub async fn update_shipment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShipmentStatusInput>,
) -> ApiResult<shipment::Model> {
    validate_input(&payload)?;
    let shipment = state.services.shipping.update_status(id, payload).await?;
    Ok(Json(ApiResponse::success(shipment)))
}

pub async fn shipment_tracking_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<shipment_tracking::Model>> {
    let history = state.services.shipping.tracking_history(id).await?;
    Ok(Json(ApiResponse::success(history)))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryInput>,
) -> Created<category::Model> {
    let category = state.services.catalog.create_category(payload).await?;
    Ok(created(category))
}

pub async fn create_manufacturer(
    State(state): State<AppState>,
    Json(payload): Json<CreateManufacturerInput>,
) -> Created<manufacturer::Model> {
    let manufacturer = state.services.catalog.create_manufacturer(payload).await?;
    Ok(created(manufacturer))
}

pub async fn create_part(
    State(state): State<AppState>,
    Json(payload): Json<CreatePartInput>,
) -> Created<part::Model> {
    let part = state.services.catalog.create_part(payload).await?;
    Ok(created(part))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetStockRequest {
    pub stock_quantity: i32,
}

pub async fn set_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetStockRequest>,
) -> ApiResult<part::Model> {
    let part = state
        .services
        .catalog
        .set_stock(id, payload.stock_quantity)
        .await?;
    Ok(Json(ApiResponse::success(part)))
}
