use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};
use uuid::Uuid;

use super::report::{CheckReport, StreamResult, StreamSpec, StreamStatus};
use super::retry::{check_with_retry, RetryPolicy};
use crate::alert::Alert;
use crate::config::CheckConfig;
use crate::locator;
use crate::probe::StreamProbe;

pub const INVALID_LOCATOR: &str = "invalid locator";

/// Runs one check cycle over a fixed stream list and raises an alert when
/// any stream is down.
pub struct BatchChecker {
    streams: Vec<StreamSpec>,
    config: CheckConfig,
    probe: Arc<dyn StreamProbe>,
    alert_tx: Option<UnboundedSender<Alert>>,
}

impl BatchChecker {
    pub fn new(
        streams: Vec<StreamSpec>,
        config: CheckConfig,
        probe: Arc<dyn StreamProbe>,
        alert_tx: Option<UnboundedSender<Alert>>,
    ) -> Self {
        Self {
            streams,
            config,
            probe,
            alert_tx,
        }
    }

    pub fn streams(&self) -> &[StreamSpec] {
        &self.streams
    }

    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Checks every stream and returns the report. Results keep input order
    /// even when streams are checked concurrently.
    pub async fn check_all(&self) -> CheckReport {
        let started_at = Utc::now();
        let policy = RetryPolicy::from(&self.config);

        let results: Vec<StreamResult> = stream::iter(self.streams.clone())
            .map(|spec| check_stream(Arc::clone(&self.probe), spec, policy))
            .buffered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        let report = CheckReport {
            id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            results,
        };

        if let Some(alert) = Alert::from_report(&report) {
            match &self.alert_tx {
                Some(tx) => {
                    if tx.send(alert).is_err() {
                        warn!(report_id = %report.id, "Alert channel closed, alert dropped");
                    }
                }
                None => warn!(
                    report_id = %report.id,
                    down = report.down_streams().len(),
                    "Streams down, no alert channel configured"
                ),
            }
        }

        report
    }
}

// Owned arguments keep the per-stream future free of borrows, so cycles can
// run inside spawned tasks.
async fn check_stream(
    probe: Arc<dyn StreamProbe>,
    spec: StreamSpec,
    policy: RetryPolicy,
) -> StreamResult {
    let addr = match locator::parse(&spec.locator) {
        Ok(addr) => addr,
        Err(e) => {
            warn!(stream = %spec.name, error = %e, "Invalid stream locator");
            return StreamResult {
                name: spec.name,
                locator: spec.locator,
                status: StreamStatus::Invalid,
                detail: Some(INVALID_LOCATOR.to_string()),
                attempts: 0,
            };
        }
    };

    let verdict = check_with_retry(probe.as_ref(), &addr, &policy).await;
    if verdict.status == StreamStatus::Active {
        info!(stream = %spec.name, %addr, attempts = verdict.attempts, "Stream active");
    } else {
        warn!(stream = %spec.name, %addr, attempts = verdict.attempts, "Stream down after retries");
    }

    StreamResult {
        name: spec.name,
        locator: spec.locator,
        status: verdict.status,
        detail: verdict.detail,
        attempts: verdict.attempts,
    }
}

/// Logs one line per stream plus a cycle summary.
pub fn log_report(report: &CheckReport) {
    for r in &report.results {
        info!(
            stream = %r.name,
            locator = %r.locator,
            status = %r.status,
            detail = r.detail.as_deref().unwrap_or("none"),
            "Stream status"
        );
    }
    info!(
        report_id = %report.id,
        total = report.len(),
        down = report.down_streams().len(),
        elapsed_ms = report.elapsed_ms(),
        "Check cycle complete"
    );
}
