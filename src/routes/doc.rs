use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            ChangePasswordRequest, LoginRequest, RefreshRequest, SignupRequest, TokenPair,
            UpdateProfileRequest, UserSummary,
        },
        cart::{AddToCartRequest, CartLine, CartProduct, CartView, UpdateCartItemRequest},
        orders::{
            CheckoutRequest, CheckoutResponse, OrderDetail, OrderLine, OrderList,
            UpdateOrderStatusRequest,
        },
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
    },
    models::{CartItem, Order, OrderItem, OrderStatus, Product, UserRole},
    response::{ApiResponse, Meta},
    routes::{auth, cart, health, orders, params, products, vendor},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::signup,
        auth::token,
        auth::refresh,
        auth::me,
        auth::update_profile,
        auth::change_password,
        products::list_products,
        products::get_product,
        vendor::create_product,
        vendor::update_product,
        vendor::delete_product,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        orders::checkout,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        orders::update_order_status
    ),
    components(
        schemas(
            UserRole,
            OrderStatus,
            Product,
            CartItem,
            Order,
            OrderItem,
            UserSummary,
            TokenPair,
            SignupRequest,
            LoginRequest,
            RefreshRequest,
            UpdateProfileRequest,
            ChangePasswordRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CartProduct,
            CartLine,
            CartView,
            CheckoutRequest,
            CheckoutResponse,
            OrderLine,
            OrderDetail,
            OrderList,
            UpdateOrderStatusRequest,
            params::Pagination,
            params::ProductQuery,
            health::HealthData,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartItem>,
            ApiResponse<Order>,
            ApiResponse<health::HealthData>,
            ApiResponse<UserSummary>,
            ApiResponse<TokenPair>,
            ApiResponse<CartView>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<OrderDetail>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication and profile endpoints"),
        (name = "Products", description = "Public catalog endpoints"),
        (name = "Vendor", description = "Vendor product management"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
