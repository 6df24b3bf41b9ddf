mod udp;

pub use udp::UdpProbe;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::locator::ParsedAddress;

/// Socket-level failure while probing. Always counted as inactive.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to create socket: {0}")]
    Socket(#[source] std::io::Error),
    #[error("failed to set socket option {option}: {source}")]
    SocketOption {
        option: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind 0.0.0.0:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to join multicast group {group}: {source}")]
    Join {
        group: std::net::Ipv4Addr,
        #[source]
        source: std::io::Error,
    },
    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InactiveReason {
    /// Nothing arrived before the deadline.
    Timeout,
    /// A socket error, already rendered to text.
    Socket(String),
}

impl fmt::Display for InactiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "no data received within timeout"),
            Self::Socket(e) => write!(f, "{}", e),
        }
    }
}

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Active,
    Inactive(InactiveReason),
}

/// One bounded liveness check against a UDP destination.
///
/// Implementations must never report an error as active: anything other than
/// a confirmed success is `Inactive`. The trait is object-safe so the batch
/// checker can be driven by a scripted probe in tests.
#[async_trait]
pub trait StreamProbe: Send + Sync {
    async fn probe(
        &self,
        addr: &ParsedAddress,
        timeout: Duration,
        require_data: bool,
    ) -> ProbeOutcome;
}
