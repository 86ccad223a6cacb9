use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serialport::SerialPort;

use crate::error::Result;

/// Upper bound applied to serial reads when the caller asks for no timeout.
///
/// The serial backend needs a finite poll interval; a blocking read simply
/// retries after each expiry.
const SERIAL_BLOCKING_TIMEOUT: Duration = Duration::from_secs(3600);

/// A duplex byte stream to a receiver whose blocking reads can be bounded.
///
/// Implementors report an expired read timeout as an `io::Error` of kind
/// `TimedOut` or `WouldBlock`, and a closed peer as a zero-length read.
pub trait Transport: Read + Write {
    /// Bound the next blocking read. `None` blocks until data or EOF.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

/// A connected receiver stream: serial device or TCP socket.
pub struct DeviceStream {
    inner: DeviceStreamInner,
}

enum DeviceStreamInner {
    Serial(Box<dyn SerialPort>),
    Tcp(TcpStream),
}

impl DeviceStream {
    pub(crate) fn from_serial(port: Box<dyn SerialPort>) -> Self {
        Self {
            inner: DeviceStreamInner::Serial(port),
        }
    }

    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: DeviceStreamInner::Tcp(stream),
        }
    }

    /// Whether this stream is a serial device.
    pub fn is_serial(&self) -> bool {
        matches!(self.inner, DeviceStreamInner::Serial(_))
    }

    /// Shut down a TCP stream in both directions.
    ///
    /// A blocked or subsequent read observes EOF. Serial devices are closed
    /// when the stream is dropped.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            DeviceStreamInner::Serial(_) => Ok(()),
            DeviceStreamInner::Tcp(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .map_err(Into::into),
        }
    }
}

impl Read for DeviceStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Serial(port) => port.read(buf),
            DeviceStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for DeviceStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            DeviceStreamInner::Serial(port) => port.write(buf),
            DeviceStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            DeviceStreamInner::Serial(port) => port.flush(),
            DeviceStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl Transport for DeviceStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            DeviceStreamInner::Serial(port) => {
                port.set_timeout(timeout.unwrap_or(SERIAL_BLOCKING_TIMEOUT))?;
                Ok(())
            }
            DeviceStreamInner::Tcp(stream) => Transport::set_read_timeout(stream, timeout),
        }
    }

    fn transport_name(&self) -> &'static str {
        match &self.inner {
            DeviceStreamInner::Serial(_) => "serial",
            DeviceStreamInner::Tcp(_) => "tcp",
        }
    }
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        TcpStream::set_read_timeout(self, timeout).map_err(Into::into)
    }

    fn transport_name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(unix)]
impl Transport for std::os::unix::net::UnixStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout).map_err(Into::into)
    }

    fn transport_name(&self) -> &'static str {
        "unix-stream"
    }
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            DeviceStreamInner::Serial(port) => f
                .debug_struct("DeviceStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            DeviceStreamInner::Tcp(stream) => f
                .debug_struct("DeviceStream")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
        }
    }
}
