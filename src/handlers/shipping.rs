use crate::{
    services::shipments::{ShippingQuote, ShippingQuoteRequest, ShippingRate},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};

pub fn shipping_routes() -> Router<AppState> {
    Router::new()
        .route("/rates", get(shipping_rates))
        .route("/calculate", post(calculate_shipping))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipping/rates",
    responses((status = 200, description = "Available shipping rates", body = ApiResponse<Vec<ShippingRate>>)),
    tag = "Shipping"
)]
pub async fn shipping_rates(State(state): State<AppState>) -> ApiResult<Vec<ShippingRate>> {
    let rates = state.services.shipping.shipping_rates().await?;
    Ok(Json(ApiResponse::success(rates)))
}

/// Quote by destination state and parcel weight
#[utoipa::path(
    post,
    path = "/api/v1/shipping/calculate",
    request_body = ShippingQuoteRequest,
    responses(
        (status = 200, description = "Shipping quote", body = ApiResponse<ShippingQuote>),
        (status = 400, description = "Invalid weight", body = crate::errors::ErrorResponse),
    ),
    tag = "Shipping"
)]
pub async fn calculate_shipping(
    State(state): State<AppState>,
    Json(request): Json<ShippingQuoteRequest>,
) -> ApiResult<ShippingQuote> {
    let quote = state.services.shipping.calculate_shipping(&request)?;
    Ok(Json(ApiResponse::success(quote)))
}
