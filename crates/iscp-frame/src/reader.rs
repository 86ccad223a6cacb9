use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use iscp_transport::{Transport, TransportError};
use tracing::{trace, warn};

use crate::codec::{decode_frame, Decoded, FrameConfig, Protocol};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete messages from a receiver transport.
///
/// Owns the receive buffer: bytes persist across calls until a complete
/// frame is extracted, so a single read may leave zero, one, or several
/// frames buffered for later calls.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    protocol: Protocol,
    config: FrameConfig,
}

impl<T: Transport> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T, protocol: Protocol) -> Self {
        Self::with_config(inner, protocol, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, protocol: Protocol, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            protocol,
            config,
        }
    }

    /// Decode the next message from already-buffered bytes. Never performs I/O.
    ///
    /// Warnings raised while decoding are logged and returned with the message.
    pub fn try_decode(&mut self) -> Result<Option<Decoded>> {
        let decoded = decode_frame(self.protocol, &mut self.buf, self.config.max_payload_size)?;
        if let Some(decoded) = &decoded {
            for warning in &decoded.warnings {
                warn!(
                    protocol = self.protocol.name(),
                    command = %decoded.message.command,
                    "{warning}"
                );
            }
            trace!(message = %decoded.message, buffered = self.buf.len(), "decoded frame");
        }
        Ok(decoded)
    }

    /// Read the next complete message, blocking for at most `timeout`.
    ///
    /// Buffered frames are returned without touching the transport. The
    /// timeout is a single budget shared by every blocking wait this call
    /// makes. Returns `Ok(None)` when the budget runs out; `None` as the
    /// timeout blocks until a message arrives.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_message(&mut self, timeout: Option<Duration>) -> Result<Option<Decoded>> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        loop {
            if let Some(decoded) = self.try_decode()? {
                return Ok(Some(decoded));
            }

            let wait = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    Some(remaining)
                }
                None => None,
            };
            self.inner
                .set_read_timeout(wait)
                .map_err(transport_to_frame_error)?;

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                    ) =>
                {
                    continue
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            trace!(bytes = read, "received");
            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Bytes received but not yet extracted as a frame.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// The wire variant this reader decodes.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) | TransportError::Open { source: io, .. } => FrameError::Io(io),
        TransportError::Serial(err) => FrameError::Io(err.into()),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
