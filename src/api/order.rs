use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Claims;
use crate::services::ServiceError;
use crate::services::order_service;

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

// The caller's order history, newest first
pub async fn list_orders(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Query(params): Query<OrdersQuery>,
) -> impl IntoResponse {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(10).clamp(1, 100);

    match order_service::list_orders(&db, claims.user_id(), page, page_size).await {
        Ok((orders, total)) => Json(json!({
            "orders": orders,
            "total": total,
            "page": page,
            "page_size": page_size
        }))
        .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

pub async fn get_order(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match order_service::get_order(&db, claims.user_id(), id).await {
        Ok(order) => Json(json!({ "order": order })).into_response(),
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Order not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub selected_cart_items: Vec<i32>,
    #[serde(default)]
    pub address: Option<String>,
}

// Convert selected cart items into an order; all-or-nothing
pub async fn checkout(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<CheckoutRequest>,
) -> impl IntoResponse {
    match order_service::checkout(
        &db,
        claims.user_id(),
        payload.selected_cart_items,
        payload.address,
    )
    .await
    {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(json!({
                "status": "Order placed",
                "order_id": outcome.order_id,
                "total_price": outcome.total_price
            })),
        )
            .into_response(),
        Err(ServiceError::InvalidState(msg)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:?}", e) })),
        )
            .into_response(),
    }
}
