use crate::{
    auth::CallerIdentity,
    services::commerce::{AddToCartInput, CartMutation, CartView},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for cart endpoints. The cart is always the caller's
/// own, resolved from the identity headers.
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/count", get(cart_count))
        .route("/items", post(add_to_cart))
        .route("/items/:item_id", put(update_cart_item).delete(remove_cart_item))
}

/// Get the caller's cart with totals
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "Cart contents", body = ApiResponse<CartView>)),
    tag = "Cart"
)]
pub async fn get_cart(State(state): State<AppState>, caller: CallerIdentity) -> ApiResult<CartView> {
    let cart = state.services.cart.view(&caller).await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[utoipa::path(
    get,
    path = "/api/v1/cart/count",
    responses((status = 200, description = "Units in the cart", body = ApiResponse<CartCount>)),
    tag = "Cart"
)]
pub async fn cart_count(State(state): State<AppState>, caller: CallerIdentity) -> ApiResult<CartCount> {
    let count = state.services.cart.cart_count(&caller).await?;
    Ok(Json(ApiResponse::success(CartCount { count })))
}

/// Add a part to the cart
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddToCartInput,
    responses(
        (status = 200, description = "Line added or merged", body = ApiResponse<CartMutation>),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Part not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse),
    ),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(payload): Json<AddToCartInput>,
) -> ApiResult<CartMutation> {
    let mutation = state.services.cart.add_item(&caller, payload).await?;
    Ok(Json(ApiResponse::success(mutation)))
}

/// Set a line's quantity; zero or less removes it
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart line id")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Line updated", body = ApiResponse<CartMutation>),
        (status = 400, description = "Line belongs to another cart", body = crate::errors::ErrorResponse),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse),
    ),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> ApiResult<CartMutation> {
    let mutation = state
        .services
        .cart
        .update_item(&caller, item_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success(mutation)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{item_id}",
    params(("item_id" = Uuid, Path, description = "Cart line id")),
    responses((status = 200, description = "Line removed", body = ApiResponse<CartMutation>)),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(item_id): Path<Uuid>,
) -> ApiResult<CartMutation> {
    let mutation = state.services.cart.remove_item(&caller, item_id).await?;
    Ok(Json(ApiResponse::success(mutation)))
}

/// Clear all items from the cart
pub async fn clear_cart(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> ApiResult<serde_json::Value> {
    state.services.cart.clear_cart(&caller).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "Cart cleared successfully"
    }))))
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartCount {
    pub count: i64,
}
