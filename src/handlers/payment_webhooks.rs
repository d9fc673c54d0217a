use crate::{errors::ServiceError, services::payments::WebhookOutcome, AppState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde_json::json;
use tracing::{error, info, warn};

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

// POST /api/v1/payments/callback
//
// The gateway only looks at the status code, so every outcome is a small
// JSON acknowledgement rather than the usual API envelope.
#[utoipa::path(
    post,
    path = "/api/v1/payments/callback",
    request_body = String,
    responses(
        (status = 200, description = "Event applied, already applied, or ignored"),
        (status = 401, description = "Invalid signature"),
        (status = 404, description = "Payment not found"),
        (status = 500, description = "Malformed payload or processing error")
    ),
    tag = "Payments"
)]
pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let payments = &state.services.payments;

    let payload = match payments.parse_webhook(&body, signature) {
        Ok(payload) => payload,
        Err(ServiceError::Unauthorized(message)) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"status": "error", "message": message})),
            );
        }
        Err(e) => {
            warn!(error = %e, "undecodable payment webhook");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": e.to_string()})),
            );
        }
    };

    match payments.handle_webhook(&payload).await {
        Ok(WebhookOutcome::Applied) | Ok(WebhookOutcome::AlreadyApplied) => {
            (StatusCode::OK, Json(json!({"status": "success"})))
        }
        Ok(WebhookOutcome::PaymentNotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "payment_not_found"})),
        ),
        Ok(WebhookOutcome::Ignored) => {
            info!("payment webhook acknowledged without action");
            (StatusCode::OK, Json(json!({"status": "event_received"})))
        }
        Err(e) => {
            error!(error = %e, "payment webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "error", "message": e.response_message()})),
            )
        }
    }
}
