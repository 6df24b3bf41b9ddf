mod telegram;
mod webhook;

pub use telegram::{TelegramConfig, TelegramNotifier};
pub use webhook::{WebhookConfig, WebhookNotifier, WebhookPayload};

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::alert::Alert;

pub(crate) const USER_AGENT: &str = concat!("udp-monitor/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("webhook secret cannot be used as an HMAC key")]
    InvalidSecret,
}

/// Outbound alert transport.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Shared HTTP client for all notifiers. Per-request timeouts still apply.
pub fn build_client(timeout: Duration) -> Result<Client, NotifyError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(4)
        .user_agent(USER_AGENT)
        .gzip(true)
        .build()
        .map_err(NotifyError::Client)
}
