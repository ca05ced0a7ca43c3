use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::cart::{AddToCartRequest, CartLine, CartProduct, CartView, UpdateCartItemRequest},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::{ApiResponse, Meta},
};

#[derive(FromRow)]
struct CartWithProductRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
    name: String,
    price: i64,
    image_url: Option<String>,
}

pub async fn get_cart(pool: &DbPool, auth: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id, ci.product_id, ci.quantity, p.name, p.price, p.image_url
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(auth.user.id)
    .fetch_all(pool)
    .await?;

    // Live pricing: the total tracks the products' current prices until
    // checkout snapshots them.
    let total: i64 = rows
        .iter()
        .map(|row| row.price * i64::from(row.quantity))
        .sum();
    let item_count = rows.len() as i64;

    let items = rows
        .into_iter()
        .map(|row| CartLine {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            product: CartProduct {
                id: row.product_id,
                name: row.name,
                price: row.price,
                image_url: row.image_url,
            },
        })
        .collect();

    Ok(ApiResponse::success(
        "OK",
        CartView {
            items,
            total,
            item_count,
        },
        None,
    ))
}

pub async fn add_item(
    pool: &DbPool,
    auth: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::InvalidArgument(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product_exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(payload.product_id)
        .fetch_optional(pool)
        .await?;
    if product_exists.is_none() {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    // One row per (user, product): the unique constraint turns a duplicate
    // add into a quantity increment.
    let cart_item: CartItem = sqlx::query_as(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth.user.id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .fetch_one(pool)
    .await?;

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn update_item(
    pool: &DbPool,
    auth: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let existing: Option<CartItem> =
        sqlx::query_as("SELECT * FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(auth.user.id)
            .fetch_optional(pool)
            .await?;
    if existing.is_none() {
        return Err(AppError::NotFound("Cart item not found".to_string()));
    }

    // Non-positive quantities are normalized to removal, never stored.
    if payload.quantity <= 0 {
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(item_id)
            .execute(pool)
            .await?;

        if let Err(err) = log_audit(
            pool,
            Some(auth.user.id),
            "cart_remove",
            Some("cart_items"),
            Some(serde_json::json!({ "cart_item_id": item_id })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }

        return Ok(ApiResponse {
            message: "Item removed from cart".to_string(),
            data: None,
            meta: Some(Meta::empty()),
        });
    }

    let cart_item: CartItem =
        sqlx::query_as("UPDATE cart_items SET quantity = $1 WHERE id = $2 RETURNING *")
            .bind(payload.quantity)
            .bind(item_id)
            .fetch_one(pool)
            .await?;

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({ "cart_item_id": item_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn remove_item(
    pool: &DbPool,
    auth: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing: Option<CartItem> =
        sqlx::query_as("SELECT * FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(auth.user.id)
            .fetch_optional(pool)
            .await?;
    if existing.is_none() {
        return Err(AppError::NotFound("Cart item not found".to_string()));
    }

    sqlx::query("DELETE FROM cart_items WHERE id = $1")
        .bind(item_id)
        .execute(pool)
        .await?;

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "cart_item_id": item_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Item removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
