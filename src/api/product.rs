use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Claims;
use crate::models::category::Entity as Category;
use crate::models::product::{self, Entity as Product, ProductDto};
use crate::services::review_service::{self, ReviewUpsert};
use crate::services::ServiceError;
use crate::slug::slugify;

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

fn page_params(page: Option<u64>, page_size: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    (page, page_size)
}

#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    pub category: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

// List products with catalog filters. Clients only see active products;
// admins see the full catalog.
pub async fn list_products(
    State(db): State<DatabaseConnection>,
    claims: Option<Claims>,
    Query(params): Query<ProductsQuery>,
) -> impl IntoResponse {
    let is_admin = claims.map(|c| c.is_admin()).unwrap_or(false);
    let (page, page_size) = page_params(params.page, params.page_size);

    let mut condition = Condition::all();

    if !is_admin {
        condition = condition.add(product::Column::IsActive.eq(true));
    }
    if let Some(category_id) = params.category {
        condition = condition.add(product::Column::CategoryId.eq(category_id));
    }
    if let Some(min_price) = params.min_price {
        condition = condition.add(product::Column::Price.gte(min_price));
    }
    if let Some(max_price) = params.max_price {
        condition = condition.add(product::Column::Price.lte(max_price));
    }
    if let Some(search) = params.search.filter(|s| !s.trim().is_empty()) {
        condition = condition.add(product::Column::Name.contains(search.trim()));
    }

    let query = Product::find().filter(condition);

    let total = match query.clone().count(&db).await {
        Ok(t) => t,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let query = match params.ordering.as_deref() {
        Some("price") => query.order_by_asc(product::Column::Price),
        Some("-price") => query.order_by_desc(product::Column::Price),
        // Newest first by default
        _ => query.order_by_desc(product::Column::Id),
    };

    let products = match query
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(&db)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let product_ids: Vec<i32> = products.iter().map(|p| p.id).collect();
    let ratings = match review_service::rating_map(&db, product_ids).await {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("{:?}", e) })),
            )
                .into_response();
        }
    };

    let dtos: Vec<ProductDto> = products
        .into_iter()
        .map(|model| {
            let (avg, count) = ratings.get(&model.id).copied().unwrap_or((0.0, 0));
            let mut dto = ProductDto::from(model);
            dto.avg_rating = Some(avg);
            dto.reviews_count = Some(count);
            dto
        })
        .collect();

    Json(json!({
        "products": dtos,
        "total": total,
        "page": page,
        "page_size": page_size
    }))
    .into_response()
}

pub async fn get_product(
    State(db): State<DatabaseConnection>,
    claims: Option<Claims>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let is_admin = claims.map(|c| c.is_admin()).unwrap_or(false);

    let product = match Product::find_by_id(id).one(&db).await {
        Ok(p) => p,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    match product {
        // Hidden products are only visible to admins
        Some(model) if model.is_active || is_admin => {
            let ratings = review_service::rating_map(&db, vec![model.id])
                .await
                .unwrap_or_default();
            let (avg, count) = ratings.get(&model.id).copied().unwrap_or((0.0, 0));
            let mut dto = ProductDto::from(model);
            dto.avg_rating = Some(avg);
            dto.reviews_count = Some(count);
            Json(json!({ "product": dto })).into_response()
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Product not found" })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductInput {
    pub category_id: i32,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub discount_price: Option<f64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

pub async fn create_product(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(input): Json<ProductInput>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Admin access required" })),
        )
            .into_response();
    }

    if input.price < 0.0 || input.stock < 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Price and stock must not be negative" })),
        )
            .into_response();
    }

    match Category::find_by_id(input.category_id).one(&db).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Unknown category" })),
            )
                .into_response();
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    }

    let slug = input
        .slug
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| slugify(&input.name));

    let now = chrono::Utc::now().to_rfc3339();
    let new_product = product::ActiveModel {
        category_id: Set(input.category_id),
        name: Set(input.name),
        slug: Set(slug),
        description: Set(input.description),
        price: Set(input.price),
        discount_price: Set(input.discount_price),
        image: Set(input.image),
        stock: Set(input.stock),
        is_active: Set(input.is_active),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_product.insert(&db).await {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "product": ProductDto::from(model),
                "message": "Product created successfully"
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn update_product(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(input): Json<ProductInput>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Admin access required" })),
        )
            .into_response();
    }

    if input.price < 0.0 || input.stock < 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Price and stock must not be negative" })),
        )
            .into_response();
    }

    let product = Product::find_by_id(id).one(&db).await.unwrap_or(None);

    if let Some(product) = product {
        let mut active: product::ActiveModel = product.into();
        active.category_id = Set(input.category_id);
        active.name = Set(input.name);
        if let Some(slug) = input.slug.filter(|s| !s.trim().is_empty()) {
            active.slug = Set(slug);
        }
        active.description = Set(input.description);
        active.price = Set(input.price);
        active.discount_price = Set(input.discount_price);
        active.image = Set(input.image);
        active.stock = Set(input.stock);
        active.is_active = Set(input.is_active);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        match active.update(&db).await {
            Ok(model) => (
                StatusCode::OK,
                Json(json!({
                    "product": ProductDto::from(model),
                    "message": "Product updated successfully"
                })),
            )
                .into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
        }
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Product not found" })),
        )
            .into_response()
    }
}

pub async fn delete_product(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Admin access required" })),
        )
            .into_response();
    }

    match Product::delete_by_id(id).exec(&db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "message": "Product deleted successfully" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

// Hide or re-activate a product without touching the rest of it
pub async fn toggle_active(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Admin access required" })),
        )
            .into_response();
    }

    let product = Product::find_by_id(id).one(&db).await.unwrap_or(None);

    if let Some(product) = product {
        let now_active = !product.is_active;
        let mut active: product::ActiveModel = product.into();
        active.is_active = Set(now_active);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        match active.update(&db).await {
            Ok(_) => (
                StatusCode::OK,
                Json(json!({
                    "status": "success",
                    "is_active": now_active,
                    "message": if now_active { "Product activated" } else { "Product hidden" }
                })),
            )
                .into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response(),
        }
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Product not found" })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

pub async fn list_reviews(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Query(params): Query<ReviewsQuery>,
) -> impl IntoResponse {
    let (page, page_size) = page_params(params.page, params.page_size);

    match review_service::list_reviews(&db, id, page, page_size).await {
        Ok((reviews, total)) => Json(json!({
            "reviews": reviews,
            "total": total,
            "page": page,
            "page_size": page_size
        }))
        .into_response(),
        Err(ServiceError::Database(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e })),
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
pub struct AddReviewRequest {
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
}

// Add or update the caller's review (one per user/product pair)
pub async fn add_review(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(payload): Json<AddReviewRequest>,
) -> impl IntoResponse {
    match review_service::upsert_review(&db, claims.user_id(), id, payload.rating, payload.comment)
        .await
    {
        Ok(ReviewUpsert::Created(_)) => (
            StatusCode::CREATED,
            Json(json!({ "status": "Review added" })),
        )
            .into_response(),
        Ok(ReviewUpsert::Updated(_)) => {
            (StatusCode::OK, Json(json!({ "status": "Review updated" }))).into_response()
        }
        Err(ServiceError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Product not found" })),
        )
            .into_response(),
        Err(ServiceError::Forbidden(msg)) => {
            (StatusCode::FORBIDDEN, Json(json!({ "error": msg }))).into_response()
        }
        Err(ServiceError::InvalidState(msg)) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
        }
        Err(ServiceError::Database(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e })),
        )
            .into_response(),
    }
}
