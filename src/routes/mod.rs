use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod shipping;
pub mod wishlist;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/products", products::router())
        .nest("/auth", auth::router())
        .nest("/checkout", checkout::router())
        .nest("/orders", orders::router())
        .nest("/shipping-methods", shipping::router())
        .nest("/wishlist", wishlist::router())
        .nest("/admin", admin::router())
}
