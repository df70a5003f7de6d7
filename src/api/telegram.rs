use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;

use crate::auth::create_jwt;
use crate::config::Config;
use crate::services::ServiceError;
use crate::services::telegram_service::{self, TelegramUpdate};
use crate::telegram::TelegramClient;

/// Webhook consumed by the Telegram bot. Always answers 200: Telegram
/// redelivers updates on any other status, so parse failures and flow
/// errors are logged and swallowed.
pub async fn webhook(State(db): State<DatabaseConnection>, body: String) -> impl IntoResponse {
    let update: TelegramUpdate = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::debug!("Ignoring unparseable webhook payload: {}", e);
            return StatusCode::OK;
        }
    };

    let bot = TelegramClient::from_config(&Config::from_env());

    if let Err(e) = telegram_service::handle_update(&db, &bot, update).await {
        tracing::error!("Telegram webhook handling failed: {:?}", e);
    }

    StatusCode::OK
}

#[derive(Deserialize)]
pub struct TelegramLoginRequest {
    code: String,
}

/// Exchange a one-time code from the bot for a bearer token.
pub async fn telegram_login(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<TelegramLoginRequest>,
) -> impl IntoResponse {
    match telegram_service::verify_code(&db, &payload.code).await {
        Ok(user) => match create_jwt(user.id, &user.username, &user.role) {
            Ok(token) => (
                StatusCode::OK,
                Json(json!({
                    "token": token,
                    "username": user.username,
                    "role": user.role
                })),
            )
                .into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e })),
            )
                .into_response(),
        },
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
