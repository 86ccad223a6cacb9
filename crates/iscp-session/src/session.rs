use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use iscp_frame::{encode_frame, FrameConfig, FrameReader, Message, Protocol};
use iscp_transport::{DeviceStream, Endpoint, Transport};
use tracing::{debug, warn};

use crate::commands::CommandTable;
use crate::discovery::DiscoveredDevice;
use crate::error::{Result, SessionError};
use crate::queue::{PendingCommand, WriteQueue};

/// Configuration for a receiver session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// Frame decoding limits.
    pub frame: FrameConfig,
}

/// One control session with one receiver.
///
/// `write` never waits for the receiver: it enqueues, and transmits at once
/// only when nothing is in flight. `read` is the only blocking call; every
/// frame it consumes completes the in-flight command and releases the next.
///
/// A session is single-threaded. Share it across threads behind a lock.
pub struct Session<T> {
    reader: FrameReader<T>,
    queue: WriteQueue,
    commands: Arc<CommandTable>,
    /// A transmit failure that happened after a message was already read.
    deferred: Option<SessionError>,
}

impl Session<DeviceStream> {
    /// Open a device descriptor (`/dev/ttyUSB0`, `host`, `host:port`).
    pub fn open(
        descriptor: &str,
        commands: Arc<CommandTable>,
        config: SessionConfig,
    ) -> Result<Self> {
        let endpoint = Endpoint::parse(descriptor)?;
        Self::open_endpoint(&endpoint, commands, config)
    }

    /// Open an already-parsed endpoint. Serial endpoints speak ISCP, TCP
    /// endpoints eISCP.
    pub fn open_endpoint(
        endpoint: &Endpoint,
        commands: Arc<CommandTable>,
        config: SessionConfig,
    ) -> Result<Self> {
        let stream = iscp_transport::open(endpoint)?;
        Ok(Self::new(
            stream,
            Protocol::for_endpoint(endpoint),
            commands,
            config,
        ))
    }

    /// Connect to a receiver found by discovery.
    pub fn connect(
        device: &DiscoveredDevice,
        commands: Arc<CommandTable>,
        config: SessionConfig,
    ) -> Result<Self> {
        Self::open_endpoint(&device.endpoint(), commands, config)
    }
}

impl<T: Transport> Session<T> {
    /// Wrap an open transport.
    pub fn new(
        transport: T,
        protocol: Protocol,
        commands: Arc<CommandTable>,
        config: SessionConfig,
    ) -> Self {
        debug!(
            transport = transport.transport_name(),
            protocol = protocol.name(),
            "session started"
        );
        Self {
            reader: FrameReader::with_config(transport, protocol, config.frame),
            queue: WriteQueue::new(),
            commands,
            deferred: None,
        }
    }

    /// Resolve a phrase or wire code through the command table and enqueue it.
    ///
    /// `on_complete` fires once, when the next frame after this command's
    /// transmission is read. It is not matched to a specific response.
    pub fn write<F>(&mut self, command: &str, on_complete: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let message = self.commands.resolve(command)?;
        self.send(message, on_complete)
    }

    /// Enqueue an already-built message.
    pub fn send<F>(&mut self, message: Message, on_complete: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.take_deferred()?;
        let mut wire = BytesMut::new();
        encode_frame(self.reader.protocol(), &message, &mut wire)?;
        let command = PendingCommand::new(message, wire.freeze(), Some(Box::new(on_complete)));
        self.queue.enqueue(self.reader.get_mut(), command)
    }

    /// Read the next message, waiting at most `timeout` (`None` waits forever).
    ///
    /// Returns `Ok(None)` when the timeout elapses. A closed transport is an
    /// error, never `Ok(None)`.
    ///
    /// A message that was read is always returned. If transmitting the next
    /// queued command fails afterwards, that command stays queued and the
    /// error is returned by the next `read`, `write`, or `send`.
    pub fn read(&mut self, timeout: Option<Duration>) -> Result<Option<Message>> {
        self.take_deferred()?;
        let Some(decoded) = self.reader.read_message(timeout)? else {
            return Ok(None);
        };
        if let Err(err) = self.queue.on_frame_consumed(self.reader.get_mut()) {
            warn!(message = %decoded.message, "next command not transmitted: {err}");
            self.deferred = Some(err);
        }
        Ok(Some(decoded.message))
    }

    fn take_deferred(&mut self) -> Result<()> {
        match self.deferred.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The wire variant this session speaks.
    pub fn protocol(&self) -> Protocol {
        self.reader.protocol()
    }

    /// The command awaiting implicit completion, if any.
    pub fn in_flight(&self) -> Option<&Message> {
        self.queue.in_flight()
    }

    /// Commands queued behind the in-flight one.
    pub fn pending_len(&self) -> usize {
        self.queue.pending_len()
    }

    /// True when every written command has completed.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// The command table used by [`Session::write`].
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        self.reader.get_ref()
    }

    /// Consume the session and return the transport. Queued commands are dropped.
    pub fn into_inner(self) -> T {
        self.reader.into_inner()
    }
}
