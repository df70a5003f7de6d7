use serde::Serialize;
use serde_json::Value;

use crate::config::Config;

/// Thin client for the Telegram Bot API (sendMessage only).
#[derive(Clone)]
pub struct TelegramClient {
    base_url: String,
    token: String,
}

#[derive(Serialize)]
struct SendMessagePayload<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<Value>,
}

impl TelegramClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.telegram_api_base, &config.telegram_bot_token)
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_markup: Option<Value>,
    ) -> Result<(), String> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| e.to_string())?;

        let payload = SendMessagePayload {
            chat_id,
            text,
            parse_mode: "HTML",
            reply_markup,
        };

        let resp = client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("Telegram API returned {}", resp.status()));
        }

        Ok(())
    }
}

/// One-button reply keyboard asking the user to share their contact.
pub fn request_contact_keyboard(button_text: &str) -> Value {
    serde_json::json!({
        "keyboard": [[{ "text": button_text, "request_contact": true }]],
        "resize_keyboard": true,
        "one_time_keyboard": true
    })
}

pub fn remove_keyboard() -> Value {
    serde_json::json!({ "remove_keyboard": true })
}
