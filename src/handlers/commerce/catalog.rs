use crate::{
    entities::commerce::{category, manufacturer},
    errors::ServiceError,
    handlers::common::PaginatedResponse,
    services::commerce::{PartListQuery, PartView},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

/// Creates the router for catalog endpoints
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/parts", get(list_parts))
        .route("/parts/:id", get(get_part))
        .route("/parts/by-slug/:slug", get(get_part_by_slug))
        .route("/categories", get(list_categories))
        .route("/manufacturers", get(list_manufacturers))
}

/// List active parts
#[utoipa::path(
    get,
    path = "/api/v1/parts",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<u64>, Query, description = "Items per page (default: 20, max: 100)"),
        ("category" = Option<String>, Query, description = "Category slug"),
        ("manufacturer" = Option<String>, Query, description = "Manufacturer slug"),
        ("search" = Option<String>, Query, description = "Name or part number"),
    ),
    responses(
        (status = 200, description = "Parts listed", body = ApiResponse<PaginatedResponse<PartView>>),
        (status = 404, description = "Unknown category or manufacturer", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalog"
)]
pub async fn list_parts(
    State(state): State<AppState>,
    Query(query): Query<PartListQuery>,
) -> ApiResult<PaginatedResponse<PartView>> {
    let (offset, per_page) = query.window();
    let (parts, total) = state.services.catalog.list_parts(query).await?;
    let page = offset / per_page + 1;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        parts, page, per_page, total,
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/parts/{id}",
    params(("id" = Uuid, Path, description = "Part id")),
    responses(
        (status = 200, description = "Part found", body = ApiResponse<PartView>),
        (status = 404, description = "Part not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalog"
)]
pub async fn get_part(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<PartView> {
    let part = state.services.catalog.get_part(id).await?;
    if !part.is_active {
        return Err(ServiceError::NotFound(format!("Part {} not found", id)));
    }
    Ok(Json(ApiResponse::success(PartView::try_from(part)?)))
}

#[utoipa::path(
    get,
    path = "/api/v1/parts/by-slug/{slug}",
    params(("slug" = String, Path, description = "Part slug")),
    responses(
        (status = 200, description = "Part found", body = ApiResponse<PartView>),
        (status = 404, description = "Part not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalog"
)]
pub async fn get_part_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<PartView> {
    let part = state.services.catalog.get_part_by_slug(&slug).await?;
    Ok(Json(ApiResponse::success(PartView::try_from(part)?)))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<category::Model>> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

pub async fn list_manufacturers(
    State(state): State<AppState>,
) -> ApiResult<Vec<manufacturer::Model>> {
    let manufacturers = state.services.catalog.list_manufacturers().await?;
    Ok(Json(ApiResponse::success(manufacturers)))
}
