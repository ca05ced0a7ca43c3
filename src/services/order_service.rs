use std::collections::HashMap;

use chrono::Utc;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    db::DbPool,
    dto::orders::{
        CheckoutRequest, CheckoutResponse, OrderDetail, OrderLine, OrderList,
        UpdateOrderStatusRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_staff},
    models::{Order, OrderStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
};

/// A cart line joined with the product's current price. The price read here
/// is the one snapshotted onto the order line.
#[derive(Debug, FromRow)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
}

pub fn order_total(lines: &[PricedLine]) -> i64 {
    lines
        .iter()
        .map(|line| line.price * i64::from(line.quantity))
        .sum()
}

/// Create an order from the caller's cart. The whole sequence runs in one
/// transaction: a failure after the order insert must not leave an order
/// without its items or a cleared cart without an order.
pub async fn checkout(
    pool: &DbPool,
    auth: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    let mut txn = pool.begin().await?;

    // FOR UPDATE pins the cart rows so two concurrent checkouts of the same
    // cart serialize instead of both spending it.
    let lines: Vec<PricedLine> = sqlx::query_as(
        r#"
        SELECT ci.product_id, ci.quantity, p.price
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        FOR UPDATE
        "#,
    )
    .bind(auth.user.id)
    .fetch_all(&mut *txn)
    .await?;

    if lines.is_empty() {
        return Err(AppError::InvalidArgument("Cart is empty".to_string()));
    }

    let total_amount = order_total(&lines);
    let order_id = Uuid::new_v4();
    let payment_intent_id = build_payment_reference(order_id);

    let order: Order = sqlx::query_as(
        r#"
        INSERT INTO orders (id, user_id, total_amount, status, payment_intent_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(order_id)
    .bind(auth.user.id)
    .bind(total_amount)
    .bind(OrderStatus::Created)
    .bind(&payment_intent_id)
    .fetch_one(&mut *txn)
    .await?;

    for line in &lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.price)
        .execute(&mut *txn)
        .await?;
    }

    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(auth.user.id)
        .execute(&mut *txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "payment_method": payload.payment_method,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutResponse {
            order_id: order.id,
            total_amount: order.total_amount,
            payment_intent_id: order.payment_intent_id,
            status: order.status,
        },
        Some(Meta::empty()),
    ))
}

#[derive(Debug, FromRow)]
struct OrderWithCountRow {
    id: Uuid,
    total_amount: i64,
    status: OrderStatus,
    payment_intent_id: String,
    created_at: chrono::DateTime<Utc>,
    item_count: i64,
}

pub async fn list_orders(
    pool: &DbPool,
    auth: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    let (skip, limit) = pagination.normalize();

    let rows: Vec<OrderWithCountRow> = sqlx::query_as(
        r#"
        SELECT o.id, o.total_amount, o.status, o.payment_intent_id, o.created_at,
               COUNT(oi.id) AS item_count
        FROM orders o
        LEFT JOIN order_items oi ON oi.order_id = o.id
        WHERE o.user_id = $1
        GROUP BY o.id
        ORDER BY o.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(auth.user.id)
    .bind(limit)
    .bind(skip)
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(auth.user.id)
        .fetch_one(pool)
        .await?;

    let order_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut lines_by_order = fetch_order_lines(pool, &order_ids).await?;

    let items = rows
        .into_iter()
        .map(|row| OrderDetail {
            items: lines_by_order.remove(&row.id).unwrap_or_default(),
            id: row.id,
            total_amount: row.total_amount,
            status: row.status,
            payment_intent_id: row.payment_intent_id,
            created_at: row.created_at,
            item_count: row.item_count,
        })
        .collect();

    let meta = Meta::new(skip, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    pool: &DbPool,
    auth: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDetail>> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(auth.user.id)
            .fetch_optional(pool)
            .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound("Order not found".to_string())),
    };

    let mut lines_by_order = fetch_order_lines(pool, &[order.id]).await?;
    let items = lines_by_order.remove(&order.id).unwrap_or_default();

    Ok(ApiResponse::success(
        "OK",
        OrderDetail {
            id: order.id,
            total_amount: order.total_amount,
            status: order.status,
            payment_intent_id: order.payment_intent_id,
            created_at: order.created_at,
            item_count: items.len() as i64,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Self-service cancellation: owner only, and only while the order is still
/// in `created`.
pub async fn cancel_order(
    pool: &DbPool,
    auth: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    let mut txn = pool.begin().await?;

    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(id)
            .bind(auth.user.id)
            .fetch_optional(&mut *txn)
            .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound("Order not found".to_string())),
    };

    if order.status != OrderStatus::Created {
        return Err(AppError::InvalidArgument(
            "Cannot cancel order that is not in created status".to_string(),
        ));
    }

    let order: Order = sqlx::query_as("UPDATE orders SET status = $1 WHERE id = $2 RETURNING *")
        .bind(OrderStatus::Cancelled)
        .bind(id)
        .fetch_one(&mut *txn)
        .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled successfully",
        order,
        Some(Meta::empty()),
    ))
}

/// Privileged transition. Any of the five statuses may be assigned; only
/// membership in the closed set is enforced.
pub async fn update_status(
    pool: &DbPool,
    auth: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_staff(auth, "Not authorized to update order status")?;

    let status = OrderStatus::parse(&payload.status).ok_or_else(|| {
        AppError::InvalidArgument(format!(
            "Invalid status. Must be one of: {}",
            OrderStatus::allowed()
        ))
    })?;

    let order: Option<Order> =
        sqlx::query_as("UPDATE orders SET status = $1 WHERE id = $2 RETURNING *")
            .bind(status)
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound("Order not found".to_string())),
    };

    if let Err(err) = log_audit(
        pool,
        Some(auth.user.id),
        "order_status_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id, "status": status.as_str() })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        format!("Order status updated to {}", status.as_str()),
        order,
        Some(Meta::empty()),
    ))
}

async fn fetch_order_lines(
    pool: &DbPool,
    order_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<OrderLine>>> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let lines: Vec<OrderLine> = sqlx::query_as(
        r#"
        SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.price,
               p.name AS product_name, p.image_url
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        WHERE oi.order_id = ANY($1)
        "#,
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for line in lines {
        by_order.entry(line.order_id).or_default().push(line);
    }
    Ok(by_order)
}

// Stand-in for a payment-gateway call. Timestamp plus order-id prefix is
// unique enough for demo traffic, nothing more.
fn build_payment_reference(order_id: Uuid) -> String {
    let ts = Utc::now().timestamp_millis();
    let suffix = order_id.to_string();
    format!("pi_mock_{}_{}", ts, &suffix[..8])
}
