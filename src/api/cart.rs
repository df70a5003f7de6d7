use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Claims;
use crate::services::ServiceError;
use crate::services::cart_service;

// The caller's cart, created lazily on first access
pub async fn get_cart(State(db): State<DatabaseConnection>, claims: Claims) -> impl IntoResponse {
    match cart_service::cart_view(&db, claims.user_id()).await {
        Ok(view) => Json(json!(view)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: i32,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

pub async fn add_to_cart(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<AddToCartRequest>,
) -> impl IntoResponse {
    match cart_service::add_item(&db, claims.user_id(), payload.product_id, payload.quantity).await
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "Added" }))).into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Product not found" })),
        )
            .into_response(),
        Err(ServiceError::InvalidState(msg)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

pub async fn remove_from_cart(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(item_id): Path<i32>,
) -> impl IntoResponse {
    match cart_service::remove_item(&db, claims.user_id(), item_id).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "Removed" }))).into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Cart item not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}
