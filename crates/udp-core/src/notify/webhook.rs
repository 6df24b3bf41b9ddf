//! Generic JSON webhook delivery.
//!
//! Each alert is POSTed as a versioned envelope. When a secret is configured
//! the raw body is signed with HMAC-SHA256 and sent in the
//! `X-UDP-Monitor-Signature-256` header as `sha256=<hex>`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use uuid::Uuid;

use super::{Notifier, NotifyError};
use crate::alert::Alert;
use crate::checker::StreamResult;

pub const SIGNATURE_HEADER: &str = "X-UDP-Monitor-Signature-256";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,

    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_webhook_retries")]
    pub max_retries: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

fn default_webhook_timeout_ms() -> u64 {
    5000
}

fn default_webhook_retries() -> u32 {
    2
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: default_webhook_timeout_ms(),
            max_retries: default_webhook_retries(),
            secret: None,
        }
    }
}

/// The JSON envelope POSTed to webhook endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub version: u8,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub notification_type: &'static str,
    pub report_id: Uuid,
    pub text: &'a str,
    pub streams: &'a [StreamResult],
}

impl<'a> WebhookPayload<'a> {
    pub fn from_alert(alert: &'a Alert) -> Self {
        Self {
            version: 1,
            id: alert.id,
            timestamp: alert.timestamp,
            notification_type: "streams_down",
            report_id: alert.report_id,
            text: &alert.message,
            streams: &alert.down,
        }
    }
}

pub struct WebhookNotifier {
    config: WebhookConfig,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig, client: Client) -> Self {
        Self { config, client }
    }
}

const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (1-based): 500ms doubling, capped at 30s.
fn retry_backoff(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    BASE_BACKOFF
        .checked_mul(1 << exp)
        .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(&WebhookPayload::from_alert(alert))?;
        let signature = match self.config.secret.as_deref() {
            Some(secret) => Some(sign_payload(&body, secret)?),
            None => None,
        };

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = retry_backoff(attempt);
                debug!(url = %self.config.url, attempt, backoff_ms = backoff.as_millis() as u64, "Retrying webhook");
                tokio::time::sleep(backoff).await;
            }

            let mut req = self
                .client
                .post(&self.config.url)
                .header("Content-Type", "application/json")
                .timeout(timeout)
                .body(body.clone());
            if let Some(ref sig) = signature {
                req = req.header(SIGNATURE_HEADER, format!("sha256={}", sig));
            }

            match req.send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(url = %self.config.url, "Webhook delivered");
                    return Ok(());
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    let err = NotifyError::Rejected { status, body };
                    if (400..500).contains(&status) && status != 429 {
                        return Err(err);
                    }
                    last_error = Some(err);
                }
                Err(e) => last_error = Some(NotifyError::Request(e)),
            }
        }

        Err(last_error.unwrap_or(NotifyError::Rejected {
            status: 0,
            body: "no attempt made".into(),
        }))
    }
}

fn sign_payload(body: &[u8], secret: &str) -> Result<String, NotifyError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| NotifyError::InvalidSecret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::checker::{CheckReport, StreamStatus};

    fn alert() -> Alert {
        let report = CheckReport {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results: vec![
                StreamResult {
                    name: "sports".into(),
                    locator: "udp://@239.2.2.2:1234".into(),
                    status: StreamStatus::Inactive,
                    detail: Some("no response or timeout".into()),
                    attempts: 2,
                },
                StreamResult {
                    name: "broken".into(),
                    locator: "not-a-url".into(),
                    status: StreamStatus::Invalid,
                    detail: Some("invalid locator".into()),
                    attempts: 0,
                },
            ],
        };
        Alert::from_report(&report).unwrap()
    }

    #[test]
    fn payload_carries_down_streams() {
        let alert = alert();
        let payload = serde_json::to_value(WebhookPayload::from_alert(&alert)).unwrap();
        assert_eq!(payload["version"], 1);
        assert_eq!(payload["type"], "streams_down");
        assert_eq!(payload["report_id"], alert.report_id.to_string());
        assert_eq!(payload["streams"][0]["name"], "sports");
        assert_eq!(payload["streams"][0]["status"], "INACTIVE");
        assert_eq!(payload["streams"][1]["status"], "INVALID");
        assert_eq!(payload["text"], alert.message);
    }

    #[test]
    fn hmac_signature_is_deterministic() {
        let sig1 = sign_payload(b"payload", "my-secret").unwrap();
        let sig2 = sign_payload(b"payload", "my-secret").unwrap();
        let sig3 = sign_payload(b"payload", "other-secret").unwrap();
        assert_eq!(sig1, sig2);
        assert_ne!(sig1, sig3);
        assert_eq!(sig1.len(), 64);
    }

    #[tokio::test]
    async fn delivers_signed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("content-type", "application/json"))
            .and(header_exists(SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = WebhookConfig::new(format!("{}/hook", server.uri()));
        config.secret = Some("k".into());
        WebhookNotifier::new(config, Client::new())
            .notify(&alert())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut config = WebhookConfig::new(server.uri());
        config.max_retries = 1;
        WebhookNotifier::new(config, Client::new())
            .notify(&alert())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = WebhookConfig::new(server.uri());
        config.max_retries = 3;
        let err = WebhookNotifier::new(config, Client::new())
            .notify(&alert())
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 404, .. }));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(retry_backoff(1), Duration::from_millis(500));
        assert_eq!(retry_backoff(2), Duration::from_secs(1));
        assert_eq!(retry_backoff(4), Duration::from_secs(4));
        assert_eq!(retry_backoff(7), Duration::from_secs(30));
        assert_eq!(retry_backoff(56), Duration::from_secs(30));
        assert_eq!(retry_backoff(u32::MAX), Duration::from_secs(30));
    }
}
