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
use crate::models::category::{self, CategoryDto, Entity as Category};
use crate::slug::slugify;

#[derive(Debug, Deserialize)]
pub struct CategoriesQuery {
    pub parent: Option<i32>,
    pub parent_name: Option<String>,
}

// List categories. Roots only by default; pass `parent` or `parent_name`
// to get one subtree level.
pub async fn list_categories(
    State(db): State<DatabaseConnection>,
    Query(params): Query<CategoriesQuery>,
) -> impl IntoResponse {
    let mut query = Category::find().order_by_asc(category::Column::Id);

    if let Some(parent_id) = params.parent {
        query = query.filter(category::Column::ParentId.eq(parent_id));
    } else if let Some(parent_name) = params.parent_name {
        let parent = match Category::find()
            .filter(category::Column::Name.like(&parent_name))
            .one(&db)
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
        match parent {
            Some(parent) => query = query.filter(category::Column::ParentId.eq(parent.id)),
            // Unknown parent name matches nothing
            None => return Json(json!([])).into_response(),
        }
    } else {
        query = query.filter(category::Column::ParentId.is_null());
    }

    match query.all(&db).await {
        Ok(categories) => {
            let dtos: Vec<CategoryDto> = categories.into_iter().map(CategoryDto::from).collect();
            Json(json!(dtos)).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn get_category(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Category::find_by_id(id).one(&db).await {
        Ok(Some(category)) => Json(json!(CategoryDto::from(category))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Category not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub parent_id: Option<i32>,
}

pub async fn create_category(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(input): Json<CategoryInput>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Admin access required" })),
        )
            .into_response();
    }

    let slug = input
        .slug
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| slugify(&input.name));
    if slug.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Could not derive a slug; provide one explicitly" })),
        )
            .into_response();
    }

    let new_category = category::ActiveModel {
        name: Set(input.name),
        slug: Set(slug),
        parent_id: Set(input.parent_id),
        ..Default::default()
    };

    match new_category.insert(&db).await {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "category": CategoryDto::from(model),
                "message": "Category created successfully"
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

pub async fn update_category(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Path(id): Path<i32>,
    Json(input): Json<CategoryInput>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Admin access required" })),
        )
            .into_response();
    }

    let category = Category::find_by_id(id).one(&db).await.unwrap_or(None);

    if let Some(category) = category {
        let mut active: category::ActiveModel = category.into();
        active.name = Set(input.name);
        if let Some(slug) = input.slug.filter(|s| !s.trim().is_empty()) {
            active.slug = Set(slug);
        }
        active.parent_id = Set(input.parent_id);

        match active.update(&db).await {
            Ok(model) => (
                StatusCode::OK,
                Json(json!({
                    "category": CategoryDto::from(model),
                    "message": "Category updated successfully"
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
            Json(json!({ "error": "Category not found" })),
        )
            .into_response()
    }
}

// Cascades to child categories and their products
pub async fn delete_category(
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

    match Category::delete_by_id(id).exec(&db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "message": "Category deleted successfully" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
