use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, post, put},
};
use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::products::{CreateProductRequest, UpdateProductRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    services::product_service,
};

pub fn router() -> Router<DbPool> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/{id}", put(update_product))
        .route("/products/{id}", delete(delete_product))
}

#[utoipa::path(
    post,
    path = "/vendor/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Create product", body = ApiResponse<Product>),
        (status = 403, description = "Caller is not a vendor or admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn create_product(
    State(pool): State<DbPool>,
    auth: AuthUser,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::create_product(&pool, &auth, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/vendor/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Partially update product", body = ApiResponse<Product>),
        (status = 403, description = "Caller is neither the owning vendor nor an admin"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn update_product(
    State(pool): State<DbPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::update_product(&pool, &auth, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/vendor/products/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Soft-delete product", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Caller is neither the owning vendor nor an admin"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor"
)]
pub async fn delete_product(
    State(pool): State<DbPool>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&pool, &auth, id).await?;
    Ok(Json(resp))
}
