pub mod auth;
pub mod cart;
pub mod category;
pub mod health;
pub mod order;
pub mod product;
pub mod profile;
pub mod telegram;

use axum::{
    Router,
    routing::{delete, get, post},
};
use sea_orm::DatabaseConnection;

pub fn api_router(db: DatabaseConnection) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::get_me))
        // Telegram auth
        .route("/auth/telegram", post(telegram::telegram_login))
        .route("/auth/telegram/webhook", post(telegram::webhook))
        // Categories
        .route(
            "/categories",
            get(category::list_categories).post(category::create_category),
        )
        .route(
            "/categories/:id",
            get(category::get_category)
                .put(category::update_category)
                .delete(category::delete_category),
        )
        // Products
        .route(
            "/products",
            get(product::list_products).post(product::create_product),
        )
        .route(
            "/products/:id",
            get(product::get_product)
                .put(product::update_product)
                .delete(product::delete_product),
        )
        .route("/products/:id/toggle_active", post(product::toggle_active))
        .route(
            "/products/:id/reviews",
            get(product::list_reviews).post(product::add_review),
        )
        // Cart
        .route("/cart", get(cart::get_cart))
        .route("/cart/add", post(cart::add_to_cart))
        .route("/cart/remove/:item_id", delete(cart::remove_from_cart))
        // Orders
        .route("/orders", get(order::list_orders))
        .route("/orders/:id", get(order::get_order))
        .route("/checkout", post(order::checkout))
        // Profile
        .route(
            "/profile",
            get(profile::get_profile).patch(profile::update_profile),
        )
        .with_state(db)
}
