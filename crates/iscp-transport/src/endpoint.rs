use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::DeviceStream;

/// Default eISCP control port.
pub const DEFAULT_PORT: u16 = 60128;

/// Timeout for establishing a TCP connection to a receiver.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a receiver can be reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A serial device path, e.g. `/dev/ttyUSB0` or `COM3`.
    Serial { path: String },
    /// A TCP host and port.
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// Interpret a device descriptor.
    ///
    /// Anything containing a `/`, or of the form `COM<n>`, is a serial device.
    /// Everything else is `host[:port]`, where the port defaults to 60128.
    /// IPv6 hosts with a port must be bracketed: `[::1]:60128`.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return Err(TransportError::InvalidEndpoint(
                "device descriptor must not be empty".to_string(),
            ));
        }

        if is_serial_descriptor(descriptor) {
            return Ok(Self::Serial {
                path: descriptor.to_string(),
            });
        }

        let (host, port) = split_host_port(descriptor)?;
        if host.is_empty() {
            return Err(TransportError::InvalidEndpoint(format!(
                "missing host in '{descriptor}'"
            )));
        }

        Ok(Self::Tcp {
            host: host.to_string(),
            port,
        })
    }

    /// Whether this endpoint names a serial device.
    pub fn is_serial(&self) -> bool {
        matches!(self, Self::Serial { .. })
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial { path } => write!(f, "{path}"),
            Self::Tcp { host, port } if host.contains(':') => write!(f, "[{host}]:{port}"),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

fn is_serial_descriptor(descriptor: &str) -> bool {
    if descriptor.contains('/') {
        return true;
    }
    match (descriptor.get(..3), descriptor.get(3..)) {
        (Some(prefix), Some(number)) => {
            prefix.eq_ignore_ascii_case("com")
                && !number.is_empty()
                && number.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

fn split_host_port(descriptor: &str) -> Result<(&str, u16)> {
    if let Some(rest) = descriptor.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| {
            TransportError::InvalidEndpoint(format!("unterminated '[' in '{descriptor}'"))
        })?;
        let port = match tail {
            "" => DEFAULT_PORT,
            _ => {
                let port = tail.strip_prefix(':').ok_or_else(|| {
                    TransportError::InvalidEndpoint(format!(
                        "unexpected '{tail}' after host in '{descriptor}'"
                    ))
                })?;
                parse_port(port, descriptor)?
            }
        };
        return Ok((host, port));
    }

    // A bare IPv6 address carries several colons and no port.
    match descriptor.matches(':').count() {
        0 => Ok((descriptor, DEFAULT_PORT)),
        1 => {
            let (host, port) = descriptor.rsplit_once(':').unwrap_or((descriptor, ""));
            Ok((host, parse_port(port, descriptor)?))
        }
        _ => Ok((descriptor, DEFAULT_PORT)),
    }
}

fn parse_port(port: &str, descriptor: &str) -> Result<u16> {
    port.parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| TransportError::InvalidEndpoint(format!("invalid port in '{descriptor}'")))
}

/// Line settings for a receiver's RS-232 port.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for SerialSettings {
    /// 9600 baud, 8-N-1, no flow control.
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

/// Open a stream to the given endpoint.
pub fn open(endpoint: &Endpoint) -> Result<DeviceStream> {
    match endpoint {
        Endpoint::Serial { path } => open_serial(path, &SerialSettings::default()),
        Endpoint::Tcp { host, port } => open_tcp(host, *port),
    }
}

/// Open a serial device in raw mode with explicit line settings.
pub fn open_serial(path: &str, settings: &SerialSettings) -> Result<DeviceStream> {
    let port = serialport::new(path, settings.baud_rate)
        .data_bits(settings.data_bits)
        .parity(settings.parity)
        .stop_bits(settings.stop_bits)
        .flow_control(settings.flow_control)
        .open()
        .map_err(|e| TransportError::Open {
            endpoint: path.to_string(),
            source: e.into(),
        })?;

    info!(path, baud = settings.baud_rate, "opened serial device");
    Ok(DeviceStream::from_serial(port))
}

/// Connect to a receiver's eISCP port.
///
/// Every resolved address is tried in turn; the last failure is reported.
pub fn open_tcp(host: &str, port: u16) -> Result<DeviceStream> {
    let endpoint = Endpoint::Tcp {
        host: host.to_string(),
        port,
    }
    .to_string();
    let open_error = |source: std::io::Error| TransportError::Open {
        endpoint: endpoint.clone(),
        source,
    };

    let addrs = (host, port).to_socket_addrs().map_err(open_error)?;

    let mut last_err = std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "host resolved to no addresses",
    );
    for addr in addrs {
        debug!(%addr, "connecting");
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                info!(%addr, "connected to receiver");
                return Ok(DeviceStream::from_tcp(stream));
            }
            Err(err) => last_err = err,
        }
    }

    Err(open_error(last_err))
}
