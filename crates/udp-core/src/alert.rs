//! Alert construction and delivery.
//!
//! The batch checker pushes one [`Alert`] per failing cycle into an mpsc
//! channel. The [`AlertDispatcher`] drains that channel in the background and
//! hands each alert to every configured [`Notifier`]. Delivery failures are
//! logged and dropped; they never reach the check loop.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::checker::{CheckReport, StreamResult};
use crate::notify::Notifier;

const ALERT_HEADER: &str = "UDP Stream Alert\nThe following streams are DOWN:\n";

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub report_id: Uuid,
    pub down: Vec<StreamResult>,
    /// Human-readable text listing every down stream.
    pub message: String,
}

impl Alert {
    /// Builds an alert for the report's down streams, or `None` if all are active.
    pub fn from_report(report: &CheckReport) -> Option<Self> {
        let down: Vec<StreamResult> = report.down_streams().into_iter().cloned().collect();
        if down.is_empty() {
            return None;
        }

        Some(Self {
            id: Uuid::new_v4(),
            timestamp: report.finished_at,
            report_id: report.id,
            message: format_message(&down),
            down,
        })
    }

    pub fn stream_names(&self) -> Vec<&str> {
        self.down.iter().map(|r| r.name.as_str()).collect()
    }
}

fn format_message(down: &[StreamResult]) -> String {
    let mut out = String::from(ALERT_HEADER);
    for r in down {
        let detail = r.detail.as_deref().unwrap_or("down");
        let _ = writeln!(out, "- {} ({}): {}", r.name, r.status, detail);
    }
    out
}

pub fn alert_channel() -> (mpsc::UnboundedSender<Alert>, mpsc::UnboundedReceiver<Alert>) {
    mpsc::unbounded_channel()
}

/// Background task delivering alerts to notifiers.
pub struct AlertDispatcher {
    rx: mpsc::UnboundedReceiver<Alert>,
    notifiers: Vec<Box<dyn Notifier>>,
}

impl AlertDispatcher {
    pub fn new(rx: mpsc::UnboundedReceiver<Alert>, notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { rx, notifiers }
    }

    /// Run until every sender is dropped.
    pub async fn run(mut self) {
        debug!(notifier_count = self.notifiers.len(), "Alert dispatcher started");

        while let Some(alert) = self.rx.recv().await {
            deliver(&self.notifiers, &alert).await;
        }

        debug!("Alert dispatcher shutting down");
    }
}

/// Sends one alert to every notifier, logging failures.
pub async fn deliver(notifiers: &[Box<dyn Notifier>], alert: &Alert) {
    warn!(
        alert_id = %alert.id,
        down = alert.down.len(),
        streams = ?alert.stream_names(),
        "Streams down"
    );

    for notifier in notifiers {
        match notifier.notify(alert).await {
            Ok(()) => debug!(notifier = notifier.name(), alert_id = %alert.id, "Alert delivered"),
            Err(e) => warn!(
                notifier = notifier.name(),
                alert_id = %alert.id,
                error = %e,
                "Alert delivery failed"
            ),
        }
    }
}
