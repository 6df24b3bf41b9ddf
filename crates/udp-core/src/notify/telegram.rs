use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Notifier, NotifyError};
use crate::alert::Alert;

/// Telegram Bot API credentials and delivery settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_telegram_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".into()
}

fn default_telegram_timeout_ms() -> u64 {
    10_000
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: default_api_base(),
            timeout_ms: default_telegram_timeout_ms(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        )
    }
}

// The token grants full control of the bot; keep it out of logs.
impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig, client: Client) -> Self {
        Self { config, client }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let body = SendMessage {
            chat_id: &self.config.chat_id,
            text: &alert.message,
        };

        let resp = self
            .client
            .post(self.config.send_message_url())
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(chat_id = %self.config.chat_id, alert_id = %alert.id, "Telegram message sent");
        Ok(())
    }
}
