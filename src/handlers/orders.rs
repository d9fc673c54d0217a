use super::common::{PaginatedResponse, PaginationParams};
use crate::{
    auth::CallerIdentity,
    services::{
        orders::{OrderDetails, OrderSummary, DEFAULT_ORDERS_PER_PAGE},
        shipments::TrackingInfo,
    },
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/tracking", get(track_order))
}

/// List the caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<PaginatedResponse<OrderSummary>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 401, description = "Sign-in required", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
    caller: CallerIdentity,
) -> ApiResult<PaginatedResponse<OrderSummary>> {
    let per_page = params.per_page.unwrap_or(DEFAULT_ORDERS_PER_PAGE).clamp(1, 100);
    let (orders, total) = state
        .services
        .orders
        .list_orders(&caller, params.page, per_page)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        orders,
        params.page,
        per_page,
        total,
    ))))
}

/// Order detail with items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderDetails>),
        (status = 401, description = "Sign-in required", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> ApiResult<OrderDetails> {
    let order = state.services.orders.get_order(&caller, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Delivery progress for one of the caller's orders
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/tracking",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Tracking timeline", body = ApiResponse<TrackingInfo>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn track_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    caller: CallerIdentity,
) -> ApiResult<TrackingInfo> {
    let tracking = state.services.shipping.track_order(&caller, id).await?;
    Ok(Json(ApiResponse::success(tracking)))
}
