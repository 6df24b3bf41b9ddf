use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::{InactiveReason, ProbeError, ProbeOutcome, StreamProbe};
use crate::locator::ParsedAddress;

const DEFAULT_RECV_BUFFER: usize = 4096;

/// Passive UDP listener probe.
///
/// Each probe binds its own socket on the wildcard address and the stream's
/// port, joins the group for multicast destinations, and optionally waits for
/// one datagram. The socket is owned by the probe future, so it is closed on
/// every return path and when the future is dropped mid-wait.
#[derive(Debug, Clone)]
pub struct UdpProbe {
    recv_buffer: usize,
}

impl UdpProbe {
    pub fn new() -> Self {
        Self {
            recv_buffer: DEFAULT_RECV_BUFFER,
        }
    }
}

impl Default for UdpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamProbe for UdpProbe {
    async fn probe(
        &self,
        addr: &ParsedAddress,
        timeout: Duration,
        require_data: bool,
    ) -> ProbeOutcome {
        debug!(
            host = %addr.host,
            port = addr.port,
            multicast = addr.is_multicast(),
            require_data,
            "Probing stream"
        );

        let outcome = match self.try_probe(addr, timeout, require_data).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(host = %addr.host, port = addr.port, error = %e, "Error checking stream");
                ProbeOutcome::Inactive(InactiveReason::Socket(e.to_string()))
            }
        };

        debug!(host = %addr.host, port = addr.port, "Closed probe socket");
        outcome
    }
}

impl UdpProbe {
    async fn try_probe(
        &self,
        addr: &ParsedAddress,
        timeout: Duration,
        require_data: bool,
    ) -> Result<ProbeOutcome, ProbeError> {
        let socket = open_socket(addr)?;

        if !require_data {
            info!(host = %addr.host, port = addr.port, "Stream is ACTIVE (bind succeeded)");
            return Ok(ProbeOutcome::Active);
        }

        debug!(host = %addr.host, port = addr.port, timeout_ms = timeout.as_millis() as u64, "Waiting for data");
        match wait_for_datagram(&socket, timeout, self.recv_buffer).await? {
            Some((len, from)) => {
                info!(
                    host = %addr.host,
                    port = addr.port,
                    bytes = len,
                    %from,
                    "Stream is ACTIVE (data received)"
                );
                Ok(ProbeOutcome::Active)
            }
            None => {
                warn!(
                    host = %addr.host,
                    port = addr.port,
                    timeout_ms = timeout.as_millis() as u64,
                    "Stream is INACTIVE (no data received within timeout)"
                );
                Ok(ProbeOutcome::Inactive(InactiveReason::Timeout))
            }
        }
    }
}

/// Builds the listening socket: SO_REUSEADDR, bound to `0.0.0.0:<port>`,
/// member of the destination group when the host is multicast.
fn open_socket(addr: &ParsedAddress) -> Result<UdpSocket, ProbeError> {
    let socket =
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(ProbeError::Socket)?;

    socket
        .set_reuse_address(true)
        .map_err(|source| ProbeError::SocketOption {
            option: "SO_REUSEADDR",
            source,
        })?;
    socket
        .set_nonblocking(true)
        .map_err(|source| ProbeError::SocketOption {
            option: "O_NONBLOCK",
            source,
        })?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, addr.port);
    socket
        .bind(&bind_addr.into())
        .map_err(|source| ProbeError::Bind {
            port: addr.port,
            source,
        })?;

    if let Some(group) = addr.multicast_group() {
        socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .map_err(|source| ProbeError::Join { group, source })?;
        debug!(%group, port = addr.port, "Joined multicast group");
    }

    UdpSocket::from_std(socket.into()).map_err(ProbeError::Socket)
}

/// Waits until a non-empty datagram arrives or `timeout` elapses.
async fn wait_for_datagram(
    socket: &UdpSocket,
    timeout: Duration,
    buffer: usize,
) -> Result<Option<(usize, SocketAddr)>, ProbeError> {
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; buffer];

    loop {
        match tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Err(_) => return Ok(None),
            Ok(Ok((0, from))) => {
                trace!(%from, "Ignoring empty datagram");
            }
            Ok(Ok((len, from))) => return Ok(Some((len, from))),
            Ok(Err(e)) => return Err(ProbeError::Receive(e)),
        }
    }
}
