use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Check policy shared by every stream in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    /// How long a single probe waits for a datagram (default: 10s).
    pub timeout: Duration,
    /// Probe attempts per stream per cycle (default: 2).
    pub attempts: u32,
    /// Pause between failed attempts on the same stream (default: 2s).
    pub retry_delay: Duration,
    /// Wait for real data; when false a successful bind/join counts as active.
    pub require_data: bool,
    /// Period between check cycles when run by the scheduler (default: 300s).
    pub interval: Duration,
    /// Streams checked at the same time within one cycle (default: 1).
    pub max_concurrent: usize,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            attempts: 2,
            retry_delay: Duration::from_secs(2),
            require_data: true,
            interval: Duration::from_secs(300),
            max_concurrent: 1,
        }
    }
}

impl CheckConfig {
    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, ms: u64) -> Self {
        self.retry_delay = Duration::from_millis(ms);
        self
    }

    pub fn with_require_data(mut self, require_data: bool) -> Self {
        self.require_data = require_data;
        self
    }

    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval = Duration::from_secs(secs);
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Upper bound on how long one cycle over `stream_count` streams can take.
    pub fn worst_case_cycle(&self, stream_count: usize) -> Duration {
        let waves = u32::try_from(stream_count.div_ceil(self.max_concurrent.max(1)))
            .unwrap_or(u32::MAX);
        self.timeout
            .checked_add(self.retry_delay)
            .and_then(|d| d.checked_mul(self.attempts.max(1)))
            .and_then(|d| d.checked_mul(waves))
            .unwrap_or(Duration::MAX)
    }
}
