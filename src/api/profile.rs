use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sea_orm::*;
use serde::Deserialize;
use serde_json::json;

use crate::auth::Claims;
use crate::models::user::{self, Entity as User, UserDto};

pub async fn get_profile(
    State(db): State<DatabaseConnection>,
    claims: Claims,
) -> impl IntoResponse {
    match User::find_by_id(claims.user_id()).one(&db).await {
        Ok(Some(user)) => Json(json!(UserDto::from(user))).into_response(),
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

// username, phone and role are read-only
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

pub async fn update_profile(
    State(db): State<DatabaseConnection>,
    claims: Claims,
    Json(payload): Json<UpdateProfileRequest>,
) -> impl IntoResponse {
    let user = User::find_by_id(claims.user_id())
        .one(&db)
        .await
        .unwrap_or(None);

    if let Some(user) = user {
        let mut active: user::ActiveModel = user.into();

        if payload.first_name.is_some() {
            active.first_name = Set(payload.first_name);
        }
        if payload.last_name.is_some() {
            active.last_name = Set(payload.last_name);
        }
        if payload.address.is_some() {
            active.address = Set(payload.address);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        match active.update(&db).await {
            Ok(model) => (
                StatusCode::OK,
                Json(json!({
                    "profile": UserDto::from(model),
                    "message": "Profile updated successfully"
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
            Json(json!({ "error": "User not found" })),
        )
            .into_response()
    }
}
