use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::OrderStatus;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    /// Placeholder until a real payment gateway is wired in.
    pub payment_method: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub total_amount: i64,
    pub payment_intent_id: String,
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: i64,
    pub product_name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    pub id: Uuid,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub payment_intent_id: String,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderDetail>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}
