//! Stream locator parsing.
//!
//! A locator looks like `udp://239.1.1.1:5000`. The authority may carry a
//! source-filter marker in front of the host, either a bare `@`
//! (`udp://@239.1.1.1:5000`) or a source address (`udp://10.0.0.5@239.1.1.1:5000`);
//! the marker is dropped and only the destination host and port are kept.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("malformed locator {locator}: {reason}")]
    Malformed { locator: String, reason: String },
    #[error("unsupported scheme '{scheme}' in {locator}, expected 'udp'")]
    UnsupportedScheme { locator: String, scheme: String },
    #[error("no host in {locator}")]
    MissingHost { locator: String },
    #[error("no port in {locator}")]
    MissingPort { locator: String },
    #[error("port 0 is not valid in {locator}")]
    InvalidPort { locator: String },
}

/// Destination of a UDP stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedAddress {
    pub host: String,
    pub port: u16,
}

impl ParsedAddress {
    /// The IPv4 group to join, if the host is a multicast address (224.0.0.0/4).
    pub fn multicast_group(&self) -> Option<Ipv4Addr> {
        self.host
            .parse::<Ipv4Addr>()
            .ok()
            .filter(Ipv4Addr::is_multicast)
    }

    pub fn is_multicast(&self) -> bool {
        self.multicast_group().is_some()
    }
}

impl fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

pub fn parse(locator: &str) -> Result<ParsedAddress, LocatorError> {
    let url = Url::parse(locator.trim()).map_err(|e| LocatorError::Malformed {
        locator: locator.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "udp" {
        return Err(LocatorError::UnsupportedScheme {
            locator: locator.to_string(),
            scheme: url.scheme().to_string(),
        });
    }

    // Userinfo (the source-filter marker) never reaches the host.
    let host = match url.host() {
        Some(Host::Domain(d)) if !d.is_empty() => d.to_string(),
        Some(Host::Ipv4(a)) => a.to_string(),
        Some(Host::Ipv6(a)) => a.to_string(),
        _ => {
            return Err(LocatorError::MissingHost {
                locator: locator.to_string(),
            })
        }
    };

    let port = url.port().ok_or_else(|| LocatorError::MissingPort {
        locator: locator.to_string(),
    })?;
    if port == 0 {
        return Err(LocatorError::InvalidPort {
            locator: locator.to_string(),
        });
    }

    Ok(ParsedAddress { host, port })
}
