use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_product_manager, ensure_staff},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::ProductQuery,
    update::{PartialUpdate, ProductColumn},
};

#[derive(Debug, Default)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub search: Option<String>,
}

/// Shared WHERE clause for the listing and count statements. Both statements
/// are built through here, so their predicates cannot drift apart.
fn push_catalog_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &CatalogFilter) {
    builder.push(" WHERE is_active = TRUE");

    // "all" is a frontend sentinel for "no category filter".
    if let Some(category) = filter
        .category
        .as_deref()
        .filter(|c| !c.is_empty() && *c != "all")
    {
        builder.push(" AND category = ");
        builder.push_bind(category.to_string());
    }

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND name ILIKE ");
        builder.push_bind(format!("%{}%", search));
    }
}

pub fn build_catalog_listing<'args>(
    filter: &CatalogFilter,
    limit: i64,
    skip: i64,
) -> QueryBuilder<'args, Postgres> {
    let mut builder = QueryBuilder::new("SELECT * FROM products");
    push_catalog_filters(&mut builder, filter);
    builder.push(" ORDER BY created_at DESC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(skip);
    builder
}

pub fn build_catalog_count<'args>(filter: &CatalogFilter) -> QueryBuilder<'args, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM products");
    push_catalog_filters(&mut builder, filter);
    builder
}

pub async fn list_products(
    pool: &DbPool,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (skip, limit) = query.pagination.normalize();
    let filter = CatalogFilter {
        category: query.category,
        search: query.search,
    };

    let items: Vec<Product> = build_catalog_listing(&filter, limit, skip)
        .build_query_as()
        .fetch_all(pool)
        .await?;

    let total: i64 = build_catalog_count(&filter)
        .build_query_scalar()
        .fetch_one(pool)
        .await?;

    let meta = Meta::new(skip, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(pool: &DbPool, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product: Option<Product> =
        sqlx::query_as("SELECT * FROM products WHERE id = $1 AND is_active = TRUE")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound("Product not found".to_string())),
    };
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    pool: &DbPool,
    auth: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_staff(auth, "Not authorized to create products")?;

    let id = Uuid::new_v4();
    let product: Product = sqlx::query_as(
        r#"
        INSERT INTO products (id, name, description, price, stock, category, image_url, vendor_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payload.name)
    .bind(payload.description)
    .bind(payload.price)
    .bind(payload.stock)
    .bind(payload.category)
    .bind(payload.image_url)
    .bind(auth.user.id)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    pool: &DbPool,
    auth: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound("Product not found".to_string())),
    };

    ensure_product_manager(auth, &existing, "Not authorized to update this product")?;

    let mut update = PartialUpdate::<ProductColumn>::new();
    update.maybe_set(ProductColumn::Name, payload.name);
    update.maybe_set(ProductColumn::Description, payload.description);
    update.maybe_set(ProductColumn::Price, payload.price);
    update.maybe_set(ProductColumn::Stock, payload.stock);
    update.maybe_set(ProductColumn::Category, payload.category);
    update.maybe_set(ProductColumn::ImageUrl, payload.image_url);

    if update.is_empty() {
        return Ok(ApiResponse::success("OK", existing, Some(Meta::empty())));
    }

    let mut query = update.by_id(id);
    let product: Product = query.build_query_as().fetch_one(pool).await?;

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn delete_product(
    pool: &DbPool,
    auth: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound("Product not found".to_string())),
    };

    ensure_product_manager(auth, &existing, "Not authorized to delete this product")?;

    // Soft delete: the row stays for order history, the catalog stops
    // listing it.
    sqlx::query("UPDATE products SET is_active = FALSE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product deleted successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
