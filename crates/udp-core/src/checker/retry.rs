use std::time::Duration;

use tracing::{debug, info};

use super::report::StreamStatus;
use crate::config::CheckConfig;
use crate::locator::ParsedAddress;
use crate::probe::{ProbeOutcome, StreamProbe};

pub const NO_RESPONSE: &str = "no response or timeout";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub attempts: u32,
    pub delay: Duration,
    pub require_data: bool,
}

impl From<&CheckConfig> for RetryPolicy {
    fn from(config: &CheckConfig) -> Self {
        Self {
            timeout: config.timeout,
            attempts: config.attempts,
            delay: config.retry_delay,
            require_data: config.require_data,
        }
    }
}

/// Final status of one stream after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: StreamStatus,
    pub detail: Option<String>,
    pub attempts: u32,
}

/// Probes `addr` up to `policy.attempts` times, sleeping `policy.delay`
/// between failures. Stops at the first active outcome.
pub async fn check_with_retry(
    probe: &dyn StreamProbe,
    addr: &ParsedAddress,
    policy: &RetryPolicy,
) -> Verdict {
    let attempts = policy.attempts.max(1);

    for attempt in 1..=attempts {
        debug!(%addr, attempt, attempts, "Checking stream");
        match probe
            .probe(addr, policy.timeout, policy.require_data)
            .await
        {
            ProbeOutcome::Active => {
                return Verdict {
                    status: StreamStatus::Active,
                    detail: None,
                    attempts: attempt,
                };
            }
            ProbeOutcome::Inactive(reason) => {
                debug!(%addr, attempt, %reason, "Probe attempt failed");
                if attempt < attempts {
                    info!(
                        %addr,
                        delay_ms = policy.delay.as_millis() as u64,
                        "Retrying stream after delay"
                    );
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Verdict {
        status: StreamStatus::Inactive,
        detail: Some(NO_RESPONSE.to_string()),
        attempts,
    }
}
