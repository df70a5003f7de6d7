use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{Claims, create_jwt, hash_password, verify_password};
use crate::models::user::{self, Entity as User, UserDto};

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
    phone: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

pub async fn register(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<RegisterRequest>,
) -> impl IntoResponse {
    if payload.username.trim().is_empty()
        || payload.password.is_empty()
        || payload.phone.trim().is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "username, password and phone are required" })),
        )
            .into_response();
    }

    // Username and phone are both unique; check before inserting
    let taken = User::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(payload.username.trim()))
                .add(user::Column::Phone.eq(payload.phone.trim())),
        )
        .one(&db)
        .await;

    match taken {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Username or phone already registered" })),
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(h) => h,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e })),
            )
                .into_response();
        }
    };

    let now = chrono::Utc::now().to_rfc3339();
    let new_user = user::ActiveModel {
        username: Set(payload.username.trim().to_string()),
        password_hash: Set(Some(password_hash)),
        first_name: Set(payload.first_name),
        role: Set("client".to_string()),
        phone: Set(payload.phone.trim().to_string()),
        address: Set(payload.address),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_user.insert(&db).await {
        Ok(model) => {
            tracing::info!("Welcome aboard, {} (user #{})", model.username, model.id);
            match create_jwt(model.id, &model.username, &model.role) {
                Ok(token) => (
                    StatusCode::CREATED,
                    Json(json!({ "token": token, "user": UserDto::from(model) })),
                )
                    .into_response(),
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": e })),
                )
                    .into_response(),
            }
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

pub async fn login(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<LoginRequest>,
) -> impl IntoResponse {
    tracing::info!("Login attempt for user: {}", payload.username);

    let user = match User::find()
        .filter(user::Column::Username.eq(&payload.username))
        .one(&db)
        .await
    {
        Ok(Some(u)) => u,
        _ => {
            tracing::warn!("User not found: {}", payload.username);
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid credentials" })),
            )
                .into_response();
        }
    };

    // Telegram-only accounts carry no password and cannot log in here
    let Some(password_hash) = user.password_hash.as_deref() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid credentials" })),
        )
            .into_response();
    };

    match verify_password(&payload.password, password_hash) {
        Ok(true) => match create_jwt(user.id, &user.username, &user.role) {
            Ok(token) => (StatusCode::OK, Json(json!({ "token": token }))).into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e })),
            )
                .into_response(),
        },
        _ => {
            tracing::warn!("Password verification failed for user: {}", user.username);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid credentials" })),
            )
                .into_response()
        }
    }
}

pub async fn get_me(State(db): State<DatabaseConnection>, claims: Claims) -> impl IntoResponse {
    match User::find_by_id(claims.user_id()).one(&db).await {
        Ok(Some(user)) => (StatusCode::OK, Json(json!(UserDto::from(user)))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
