//! Receiver discovery via eISCP UDP broadcast.
//!
//! A single `ECNQSTN` query is broadcast to port 60128 from a short-lived
//! socket. Every receiver on the segment answers with an `ECN` message whose
//! argument reads `model/port/region/identifier`, e.g.
//! `TX-NR609/60128/DX/0009B0123456`.
//!
//! Only the first reply is used. On a network with several receivers the one
//! that answers fastest wins; pick a device explicitly when that matters.

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use iscp_frame::{decode_frame, discovery_query, Protocol, DEFAULT_MAX_PAYLOAD};
use iscp_transport::{Endpoint, DEFAULT_PORT};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// How long to wait for the first reply.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

const MAX_DATAGRAM: usize = 1500;

static ANNOUNCEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/([0-9]{5})/(..)/([0-9A-Fa-f]{12})").expect("announcement pattern is valid")
});

/// Where and how long to look for receivers.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Destination of the query. Default: `255.255.255.255:60128`.
    pub target: SocketAddr,
    /// Time to wait for the first reply. Default: 10 seconds.
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), DEFAULT_PORT),
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

/// A receiver that answered the discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Source address of the reply.
    pub ip: IpAddr,
    /// eISCP control port announced by the receiver.
    pub port: u16,
    /// Model name, e.g. `TX-NR609`.
    pub model: String,
    /// Two-character destination area code, e.g. `DX`.
    pub region: String,
    /// Twelve hex digits, usually the MAC address.
    pub identifier: String,
}

impl DiscoveredDevice {
    /// The TCP endpoint to open a session against.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::Tcp {
            host: self.ip.to_string(),
            port: self.port,
        }
    }
}

/// Broadcast a discovery query with default settings.
pub fn discover() -> Result<DiscoveredDevice> {
    discover_with_config(&DiscoveryConfig::default())
}

/// Send one discovery query and return the first receiver to answer.
///
/// There is no retry. Returns [`SessionError::DiscoveryTimeout`] when nothing
/// answers in time.
pub fn discover_with_config(config: &DiscoveryConfig) -> Result<DiscoveredDevice> {
    let bind_addr: SocketAddr = match config.target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind_addr)?;
    socket.set_broadcast(true)?;

    let query = discovery_query();
    socket.send_to(&query, config.target)?;
    debug!(target = %config.target, timeout = ?config.timeout, "sent discovery query");

    let deadline = Instant::now() + config.timeout;
    let mut buf = [0u8; MAX_DATAGRAM];
    let (len, source) = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(SessionError::DiscoveryTimeout(config.timeout));
        }
        socket.set_read_timeout(Some(remaining))?;

        match socket.recv_from(&mut buf) {
            Ok(received) => break received,
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                ) =>
            {
                continue
            }
            Err(err) => return Err(err.into()),
        }
    };

    let device = parse_reply(&buf[..len], source.ip())?;
    info!(
        ip = %device.ip,
        port = device.port,
        model = %device.model,
        "discovered receiver"
    );
    Ok(device)
}

/// Interpret one discovery reply datagram received from `source`.
pub fn parse_reply(datagram: &[u8], source: IpAddr) -> Result<DiscoveredDevice> {
    let mut buf = BytesMut::from(datagram);
    let decoded = decode_frame(Protocol::Eiscp, &mut buf, DEFAULT_MAX_PAYLOAD)?
        .ok_or_else(|| {
            SessionError::Protocol(format!(
                "truncated discovery reply ({} bytes)",
                datagram.len()
            ))
        })?;
    for warning in &decoded.warnings {
        warn!(%source, "discovery reply: {warning}");
    }

    let argument = &decoded.message.argument;
    let captures = ANNOUNCEMENT.captures(argument).ok_or_else(|| {
        SessionError::Protocol(format!(
            "discovery reply {:?} carries no /port/region/identifier",
            decoded.message.to_string()
        ))
    })?;

    let port = captures[1].parse::<u16>().map_err(|_| {
        SessionError::Protocol(format!("announced port {} out of range", &captures[1]))
    })?;
    let model_end = captures.get(0).map_or(0, |m| m.start());

    Ok(DiscoveredDevice {
        ip: source,
        port,
        model: argument[..model_end].to_string(),
        region: captures[2].to_string(),
        identifier: captures[3].to_string(),
    })
}
