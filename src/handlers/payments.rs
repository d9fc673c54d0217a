use crate::{
    auth::CallerIdentity,
    handlers::common::created,
    services::payments::{
        BankTransferInstructions, PaymentInitiation, TransferConfirmation, VerificationResult,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

/// Buyer-facing payment routes. The gateway webhook is mounted separately
/// because it carries no caller identity.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/initiate/:order_id", post(initiate_payment))
        .route("/bank-transfer/:order_id", get(bank_transfer))
        .route("/bank-transfer/:order_id/confirm", post(confirm_transfer))
        .route("/verify/:reference", get(verify_payment))
}

/// Start a hosted gateway payment for an order
#[utoipa::path(
    post,
    path = "/api/v1/payments/initiate/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order to pay")),
    responses(
        (status = 201, description = "Payment opened", body = ApiResponse<PaymentInitiation>),
        (status = 400, description = "Order already paid or no e-mail on file", body = crate::errors::ErrorResponse),
        (status = 401, description = "Sign-in required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    caller: CallerIdentity,
) -> Result<(StatusCode, Json<ApiResponse<PaymentInitiation>>), crate::errors::ServiceError> {
    let initiation = state
        .services
        .payments
        .initiate_payment(&caller, order_id)
        .await?;
    Ok(created(initiation))
}

/// Store bank accounts and the reference to quote on the transfer
#[utoipa::path(
    get,
    path = "/api/v1/payments/bank-transfer/{order_id}",
    params(("order_id" = Uuid, Path, description = "Order to pay")),
    responses(
        (status = 200, description = "Transfer instructions", body = ApiResponse<BankTransferInstructions>),
        (status = 400, description = "Order already paid", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn bank_transfer(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    caller: CallerIdentity,
) -> ApiResult<BankTransferInstructions> {
    let instructions = state.services.payments.bank_transfer(&caller, order_id).await?;
    Ok(Json(ApiResponse::success(instructions)))
}

/// Buyer reports the transfer as sent; awaits staff confirmation
#[utoipa::path(
    post,
    path = "/api/v1/payments/bank-transfer/{order_id}/confirm",
    params(("order_id" = Uuid, Path, description = "Order paid by transfer")),
    responses(
        (status = 200, description = "Awaiting confirmation", body = ApiResponse<TransferConfirmation>),
        (status = 400, description = "Order already paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "No transfer started", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn confirm_transfer(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    caller: CallerIdentity,
) -> ApiResult<TransferConfirmation> {
    let confirmation = state
        .services
        .payments
        .confirm_transfer(&caller, order_id)
        .await?;
    Ok(Json(ApiResponse::success(confirmation)))
}

/// Verify a payment with the gateway and apply the result
#[utoipa::path(
    get,
    path = "/api/v1/payments/verify/{reference}",
    params(("reference" = String, Path, description = "Payment reference")),
    responses(
        (status = 200, description = "Verification applied", body = ApiResponse<VerificationResult>),
        (status = 404, description = "Payment not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Unable to verify payment", body = crate::errors::ErrorResponse),
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    caller: CallerIdentity,
) -> ApiResult<VerificationResult> {
    let result = state
        .services
        .payments
        .verify_payment(&caller, &reference)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}
