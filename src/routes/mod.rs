use axum::{Router, routing::post};

use crate::db::DbPool;

pub mod auth;
pub mod cart;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod vendor;

// Build the API router without binding state; it is provided at the top level.
pub fn create_api_router() -> Router<DbPool> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .nest("/vendor", vendor::router())
        .nest("/cart", cart::router())
        .route("/checkout", post(orders::checkout))
        .nest("/orders", orders::router())
}
