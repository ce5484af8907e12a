//! Telegram Bot Integration
//!
//! Raw Bot API client plus the update handlers. Updates arrive over the
//! webhook server; replies go out through `TelegramApi`.

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub mod handlers;

pub use handlers::BotContext;

/// Telegram caps message text at 4096 chars; leave headroom for the
/// truncation marker.
const TEXT_LIMIT: usize = 4000;

/// Incoming update from the Bot API webhook.
#[derive(Deserialize, Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Incoming>,
}

/// An incoming chat message.
#[derive(Deserialize, Debug, Clone)]
pub struct Incoming {
    pub chat: Chat,
    pub text: Option<String>,
    pub from: Option<User>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Minimal Bot API client over HTTPS.
#[derive(Clone)]
pub struct TelegramApi {
    token: String,
    base_url: String,
    client: Client,
}

impl std::fmt::Debug for TelegramApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramApi")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl TelegramApi {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, "https://api.telegram.org".to_string())
    }

    /// Point the client at a different API host (used in tests).
    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            token,
            base_url,
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Send a text message, truncating to fit Telegram's limit.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);

        #[derive(Serialize)]
        struct SendMsgReq<'a> {
            chat_id: i64,
            text: &'a str,
        }

        let truncated = truncate_for_telegram(text);
        let req = SendMsgReq {
            chat_id,
            text: &truncated,
        };

        let response: ApiResponse = self
            .client
            .post(&url)
            .json(&req)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            anyhow::bail!(
                "sendMessage failed: {}",
                response.description.unwrap_or_default()
            );
        }

        debug!(chat_id, "Sent message");
        Ok(())
    }

    /// Register `webhook_url` with the Bot API so updates are delivered
    /// to our server.
    pub async fn set_webhook(&self, webhook_url: &str) -> Result<()> {
        let url = format!("{}/bot{}/setWebhook", self.base_url, self.token);

        let body = serde_json::json!({ "url": webhook_url });
        let response: ApiResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            anyhow::bail!(
                "setWebhook failed: {}",
                response.description.unwrap_or_default()
            );
        }

        Ok(())
    }
}

/// Truncate at a char boundary so multibyte replies never split mid-char.
fn truncate_for_telegram(text: &str) -> String {
    if text.len() <= TEXT_LIMIT {
        return text.to_string();
    }
    let mut end = TEXT_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...\n\n(truncated)", &text[..end])
}
