use chrono::Utc;
use marketplace_api::{
    error::AppError,
    middleware::auth::{AuthUser, ensure_product_manager, ensure_staff},
    models::{OrderStatus, Product, User, UserRole},
    services::order_service::{PricedLine, order_total},
};
use uuid::Uuid;

fn auth_user(role: UserRole) -> AuthUser {
    let id = Uuid::new_v4();
    AuthUser {
        user: User {
            id,
            email: format!("{}@example.com", id),
            username: id.to_string(),
            password_hash: "unused".to_string(),
            role,
            created_at: Utc::now(),
        },
    }
}

fn product_owned_by(vendor_id: Uuid) -> Product {
    Product {
        id: Uuid::new_v4(),
        name: "Linen Throw Blanket".to_string(),
        description: "Light enough for summer evenings".to_string(),
        price: 540_00,
        stock: 12,
        category: "home".to_string(),
        image_url: None,
        vendor_id,
        is_active: true,
        created_at: Utc::now(),
    }
}

#[test]
fn status_parses_the_closed_set_only() {
    assert_eq!(OrderStatus::parse("created"), Some(OrderStatus::Created));
    assert_eq!(OrderStatus::parse("confirmed"), Some(OrderStatus::Confirmed));
    assert_eq!(OrderStatus::parse("shipped"), Some(OrderStatus::Shipped));
    assert_eq!(OrderStatus::parse("delivered"), Some(OrderStatus::Delivered));
    assert_eq!(OrderStatus::parse("cancelled"), Some(OrderStatus::Cancelled));

    assert_eq!(OrderStatus::parse("paid"), None);
    assert_eq!(OrderStatus::parse("Created"), None);
    assert_eq!(OrderStatus::parse(""), None);
}

#[test]
fn allowed_statuses_are_named_for_error_messages() {
    let allowed = OrderStatus::allowed();
    for status in OrderStatus::ALL {
        assert!(allowed.contains(status.as_str()));
    }
}

#[test]
fn staff_check_rejects_customers() {
    assert!(ensure_staff(&auth_user(UserRole::Vendor), "denied").is_ok());
    assert!(ensure_staff(&auth_user(UserRole::Admin), "denied").is_ok());

    let result = ensure_staff(&auth_user(UserRole::Customer), "denied");
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[test]
fn products_are_managed_by_owner_or_admin() {
    let owner = auth_user(UserRole::Vendor);
    let other_vendor = auth_user(UserRole::Vendor);
    let admin = auth_user(UserRole::Admin);
    let product = product_owned_by(owner.user.id);

    assert!(ensure_product_manager(&owner, &product, "denied").is_ok());
    assert!(ensure_product_manager(&admin, &product, "denied").is_ok());

    let result = ensure_product_manager(&other_vendor, &product, "denied");
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[test]
fn order_total_sums_price_times_quantity() {
    let lines = [
        PricedLine {
            product_id: Uuid::new_v4(),
            quantity: 2,
            price: 10_00,
        },
        PricedLine {
            product_id: Uuid::new_v4(),
            quantity: 1,
            price: 5_00,
        },
    ];

    assert_eq!(order_total(&lines), 25_00);
    assert_eq!(order_total(&[]), 0);
}
