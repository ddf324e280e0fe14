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
        auth::{LoginRequest, LoginResponse, RegisterRequest},
        checkout::{AddressInput, CheckoutRequest, CheckoutResponse, LineItemInput},
        orders::{OrderList, OrderLookupQuery, OrderWithItems},
        products::{
            CreateProductRequest, CreateVariantRequest, ProductList, ProductWithVariants,
            UpdateProductRequest, UpdateVariantRequest,
        },
        shipping::{CreateShippingMethodRequest, ShippingMethodList, UpdateShippingMethodRequest},
        wishlist::{AddWishlistRequest, WishlistProductList},
    },
    entity::orders::{OrderStatus, PaymentMethod, PaymentStatus},
    models::{Address, Order, OrderItem, Product, ProductVariant, ShippingMethod, User},
    response::{ApiResponse, Meta},
    routes::{admin, auth, checkout, health, orders, params, products, shipping, wishlist},
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
        auth::login,
        auth::register,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::create_variant,
        products::update_variant,
        shipping::list_methods,
        shipping::create_method,
        shipping::update_method,
        shipping::delete_method,
        checkout::checkout,
        orders::list_orders,
        orders::lookup_order,
        orders::get_order,
        wishlist::list_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::update_payment_status,
        admin::list_low_stock,
        admin::adjust_inventory
    ),
    components(
        schemas(
            User,
            Product,
            ProductVariant,
            ShippingMethod,
            Address,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            PaymentMethod,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            CheckoutRequest,
            AddressInput,
            LineItemInput,
            CheckoutResponse,
            OrderList,
            OrderWithItems,
            OrderLookupQuery,
            ProductList,
            ProductWithVariants,
            CreateProductRequest,
            UpdateProductRequest,
            CreateVariantRequest,
            UpdateVariantRequest,
            ShippingMethodList,
            CreateShippingMethodRequest,
            UpdateShippingMethodRequest,
            AddWishlistRequest,
            WishlistProductList,
            admin::UpdateOrderStatusRequest,
            admin::UpdatePaymentStatusRequest,
            admin::InventoryAdjustRequest,
            admin::LowStockQuery,
            admin::VariantList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<ShippingMethodList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Shipping", description = "Shipping method endpoints"),
        (name = "Checkout", description = "Order placement"),
        (name = "Orders", description = "Customer order endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
