//! Telegram Service - webhook flows and one-time login codes
//!
//! The bot drives a phone-number handshake: /start asks for the contact,
//! a shared contact registers or refreshes the account, and every
//! successful step ends with a fresh one-time code.

use chrono::{Duration, Utc};
use rand::Rng;
use sea_orm::*;
use serde::Deserialize;

use super::ServiceError;
use crate::models::user::{self, Entity as User};
use crate::telegram::{TelegramClient, remove_keyboard, request_contact_keyboard};

/// How long an issued code stays valid.
const OTP_TTL_MINUTES: i64 = 5;

/// Incoming webhook payload, reduced to the fields the flows need.
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub contact: Option<TelegramContact>,
    #[serde(default)]
    pub from: Option<TelegramFrom>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramContact {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct TelegramFrom {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Dispatch one webhook update. Send failures are logged, never returned:
/// the webhook must answer 200 or Telegram keeps retrying the update.
pub async fn handle_update(
    db: &DatabaseConnection,
    bot: &TelegramClient,
    update: TelegramUpdate,
) -> Result<(), ServiceError> {
    let Some(message) = update.message else {
        return Ok(());
    };

    let chat_id = message.chat.id;
    let text = message.text.as_deref().unwrap_or("");

    if text == "/start" {
        let first_name = message
            .from
            .as_ref()
            .and_then(|f| f.first_name.clone())
            .unwrap_or_default();
        let greeting = format!(
            "Hello {} 👋\nWelcome to the Storefront!\n⬇️ Share your contact to continue",
            first_name
        );
        let keyboard = request_contact_keyboard("📱 Share my contact");
        if let Err(e) = bot.send_message(chat_id, &greeting, Some(keyboard)).await {
            tracing::warn!("Failed to send /start reply to chat {}: {}", chat_id, e);
        }
    } else if let Some(contact) = message.contact {
        let (user, created) =
            register_contact(db, chat_id, &contact.phone_number, message.from.as_ref()).await?;

        let welcome = if created {
            "🎉 <b>You are registered!</b>"
        } else {
            "👋 <b>Welcome back!</b>"
        };
        if let Err(e) = bot.send_message(chat_id, welcome, None).await {
            tracing::warn!("Failed to send welcome to chat {}: {}", chat_id, e);
        }

        send_otp(db, bot, user, chat_id).await?;
    } else if text == "/login" {
        let user = User::find()
            .filter(user::Column::TelegramChatId.eq(chat_id.to_string()))
            .one(db)
            .await?;

        match user {
            Some(user) => send_otp(db, bot, user, chat_id).await?,
            None => {
                if let Err(e) = bot
                    .send_message(chat_id, "Press /start to register first.", None)
                    .await
                {
                    tracing::warn!("Failed to send /login reply to chat {}: {}", chat_id, e);
                }
            }
        }
    }

    Ok(())
}

/// Look the user up by phone, creating the account on first contact, and
/// refresh chat id / names / username from the Telegram profile.
async fn register_contact(
    db: &DatabaseConnection,
    chat_id: i64,
    phone_number: &str,
    from: Option<&TelegramFrom>,
) -> Result<(user::Model, bool), ServiceError> {
    let phone = if phone_number.starts_with('+') {
        phone_number.to_string()
    } else {
        format!("+{}", phone_number)
    };

    let first_name = from.and_then(|f| f.first_name.clone());
    let last_name = from.and_then(|f| f.last_name.clone());
    let tg_username = from.and_then(|f| f.username.clone());

    let existing = User::find()
        .filter(user::Column::Phone.eq(&phone))
        .one(db)
        .await?;

    let (user, created) = match existing {
        Some(user) => (user, false),
        None => {
            let now = Utc::now().to_rfc3339();
            let new_user = user::ActiveModel {
                // Placeholder username; refreshed from the profile below
                username: Set(phone.clone()),
                password_hash: Set(None),
                role: Set("client".to_owned()),
                phone: Set(phone.clone()),
                telegram_chat_id: Set(Some(chat_id.to_string())),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            };
            let user = new_user.insert(db).await?;
            tracing::info!("New user #{} registered via Telegram", user.id);
            (user, true)
        }
    };

    // Pick a username: Telegram handle, then first name, then the phone
    let desired_username = tg_username
        .clone()
        .or_else(|| first_name.clone().filter(|n| !n.is_empty()))
        .unwrap_or_else(|| phone.clone());

    let chat_id_str = chat_id.to_string();
    let mut changed = false;
    let mut active: user::ActiveModel = user.clone().into();

    if user.telegram_chat_id.as_deref() != Some(chat_id_str.as_str()) {
        active.telegram_chat_id = Set(Some(chat_id_str));
        changed = true;
    }
    if user.first_name != first_name {
        active.first_name = Set(first_name);
        changed = true;
    }
    if user.last_name != last_name {
        active.last_name = Set(last_name);
        changed = true;
    }
    if user.username != desired_username {
        let taken = User::find()
            .filter(user::Column::Username.eq(&desired_username))
            .filter(user::Column::Id.ne(user.id))
            .one(db)
            .await?
            .is_some();
        if !taken {
            active.username = Set(desired_username);
            changed = true;
        }
    }

    let user = if changed {
        active.updated_at = Set(Utc::now().to_rfc3339());
        active.update(db).await?
    } else {
        user
    };

    Ok((user, created))
}

/// Issue a fresh 6-digit code and deliver it over the bot.
pub async fn send_otp(
    db: &DatabaseConnection,
    bot: &TelegramClient,
    user: user::Model,
    chat_id: i64,
) -> Result<(), ServiceError> {
    let code = format!("{}", rand::thread_rng().gen_range(100_000..=999_999));
    let expires_at = (Utc::now() + Duration::minutes(OTP_TTL_MINUTES)).to_rfc3339();

    let mut active: user::ActiveModel = user.into();
    active.verification_code = Set(Some(code.clone()));
    active.code_expires_at = Set(Some(expires_at));
    active.updated_at = Set(Utc::now().to_rfc3339());
    active.update(db).await?;

    let msg = format!(
        "🔒 Code: <code>{}</code>\n\n🔑 Send /login to get a new one",
        code
    );
    if let Err(e) = bot
        .send_message(chat_id, &msg, Some(remove_keyboard()))
        .await
    {
        tracing::warn!("Failed to deliver login code to chat {}: {}", chat_id, e);
    }

    Ok(())
}

/// Exchange a one-time code for the matching user. Codes are single-use:
/// both the code and its expiry are cleared on success.
pub async fn verify_code(
    db: &DatabaseConnection,
    code: &str,
) -> Result<user::Model, ServiceError> {
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::InvalidState(
            "The code must be 6 digits".to_string(),
        ));
    }

    let user = User::find()
        .filter(user::Column::VerificationCode.eq(code))
        .one(db)
        .await?;

    let user = match user {
        Some(user) if code_still_valid(&user) => user,
        _ => {
            return Err(ServiceError::InvalidState(
                "The code is invalid or has expired".to_string(),
            ));
        }
    };

    let mut active: user::ActiveModel = user.into();
    active.verification_code = Set(None);
    active.code_expires_at = Set(None);
    active.updated_at = Set(Utc::now().to_rfc3339());
    Ok(active.update(db).await?)
}

fn code_still_valid(user: &user::Model) -> bool {
    user.code_expires_at
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t > Utc::now())
        .unwrap_or(false)
}
