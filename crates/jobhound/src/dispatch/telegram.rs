//! Telegram notifications for vacancies that carry no recipient address.
//!
//! Uses the plain Bot API over HTTPS: `sendPhoto` when the post
//! screenshot survived ingestion, `sendMessage` otherwise.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::info;

use crate::config::TelegramConfig;
use crate::dispatch::DispatchError;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Client for one bot/chat pair. The bot token is baked into `base_url`,
/// so the URL must never be logged.
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct BotApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, DispatchError> {
        let token = config.resolve_bot_token()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: format!("https://api.telegram.org/bot{}", token.expose_secret()),
            chat_id: config.chat_id.clone(),
        })
    }

    pub async fn send_message(&self, text: &str) -> Result<(), DispatchError> {
        let url = format!("{}/sendMessage", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        check_reply(status, &body)?;

        info!(chat_id = %self.chat_id, "telegram message sent");
        Ok(())
    }

    pub async fn send_photo(&self, caption: &str, photo_png: &[u8]) -> Result<(), DispatchError> {
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part(
                "photo",
                Part::bytes(photo_png.to_vec())
                    .file_name("post.png")
                    .mime_str("image/png")?,
            );

        let url = format!("{}/sendPhoto", self.base_url);
        let response = self.client.post(&url).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        check_reply(status, &body)?;

        info!(chat_id = %self.chat_id, "telegram photo sent");
        Ok(())
    }
}

/// The Bot API signals failure both through the HTTP status and through
/// `"ok": false` in the body; either one fails the send.
fn check_reply(status: StatusCode, body: &str) -> Result<(), DispatchError> {
    let parsed: Option<BotApiReply> = serde_json::from_str(body).ok();
    let ok = parsed.as_ref().map(|reply| reply.ok).unwrap_or(false);

    if status.is_success() && ok {
        return Ok(());
    }

    let message = parsed
        .and_then(|reply| reply.description)
        .unwrap_or_else(|| body.to_string());
    Err(DispatchError::Telegram {
        status: status.as_u16(),
        message,
    })
}
