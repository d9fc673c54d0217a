use crate::{
    auth::CallerIdentity,
    handlers::common::created,
    services::commerce::{
        checkout_service::CheckoutSummary, PlaceOrderRequest, PlacedOrder,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::get,
    Router,
};

/// Creates the router for checkout endpoints
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", get(checkout_summary).post(place_order))
}

/// Cart, shipping options and saved address for the checkout page
#[utoipa::path(
    get,
    path = "/api/v1/checkout",
    responses(
        (status = 200, description = "Checkout summary", body = ApiResponse<CheckoutSummary>),
        (status = 400, description = "Cart is empty", body = crate::errors::ErrorResponse),
        (status = 401, description = "Sign-in required", body = crate::errors::ErrorResponse),
    ),
    tag = "Checkout"
)]
pub async fn checkout_summary(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> ApiResult<CheckoutSummary> {
    let summary = state.services.checkout.checkout_summary(&caller).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Place an order from the cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<PlacedOrder>),
        (status = 400, description = "Invalid form or empty cart", body = crate::errors::ErrorResponse),
        (status = 401, description = "Sign-in required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invalid shipping method", body = crate::errors::ErrorResponse),
        (status = 422, description = "Stock no longer available", body = crate::errors::ErrorResponse),
    ),
    tag = "Checkout"
)]
pub async fn place_order(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PlacedOrder>>), crate::errors::ServiceError> {
    let placed = state.services.checkout.place_order(&caller, payload).await?;
    Ok(created(placed))
}
