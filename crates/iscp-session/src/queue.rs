use std::collections::VecDeque;
use std::fmt;
use std::io::{ErrorKind, Write};

use bytes::Bytes;
use iscp_frame::{FrameError, Message};
use tracing::debug;

use crate::error::Result;

/// Invoked once when a transmitted command is presumed complete.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// An encoded command waiting to be transmitted or acknowledged.
pub struct PendingCommand {
    message: Message,
    wire: Bytes,
    on_complete: Option<Completion>,
}

impl PendingCommand {
    pub fn new(message: Message, wire: Bytes, on_complete: Option<Completion>) -> Self {
        Self {
            message,
            wire,
            on_complete,
        }
    }

    /// The logical message this command carries.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// The encoded frame.
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    fn complete(self) {
        if let Some(on_complete) = self.on_complete {
            on_complete();
        }
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("message", &self.message)
            .field("wire_len", &self.wire.len())
            .field("has_callback", &self.on_complete.is_some())
            .finish()
    }
}

/// FIFO of outgoing commands with at most one in flight.
///
/// The protocol offers no per-command acknowledgment. The in-flight command
/// is presumed complete when the next frame of any kind is consumed; its
/// callback fires then, before the next queued command is transmitted.
#[derive(Debug, Default)]
pub struct WriteQueue {
    pending: VecDeque<PendingCommand>,
    in_flight: Option<PendingCommand>,
}

impl WriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command; transmit it at once if nothing is in flight.
    pub fn enqueue<W: Write>(&mut self, sink: &mut W, command: PendingCommand) -> Result<()> {
        debug!(message = %command.message, queued = self.pending.len(), "enqueue");
        self.pending.push_back(command);
        if self.in_flight.is_none() {
            self.transmit_next(sink)?;
        }
        Ok(())
    }

    /// Complete the in-flight command and transmit the next queued one.
    ///
    /// Called whenever a frame has been consumed from the transport.
    pub fn on_frame_consumed<W: Write>(&mut self, sink: &mut W) -> Result<()> {
        if let Some(done) = self.in_flight.take() {
            debug!(message = %done.message, "presumed complete");
            done.complete();
        }
        self.transmit_next(sink)
    }

    /// The command awaiting implicit completion, if any.
    pub fn in_flight(&self) -> Option<&Message> {
        self.in_flight.as_ref().map(PendingCommand::message)
    }

    /// Commands queued behind the in-flight one.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is in flight or queued.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.pending.is_empty()
    }

    fn transmit_next<W: Write>(&mut self, sink: &mut W) -> Result<()> {
        let Some(next) = self.pending.pop_front() else {
            return Ok(());
        };

        // A failed transmit leaves the command at the head of the queue; the
        // next enqueue or consumed frame retries it.
        if let Err(err) = write_frame(sink, &next.wire) {
            self.pending.push_front(next);
            return Err(err);
        }
        debug!(message = %next.message, bytes = next.wire.len(), "transmitted");
        self.in_flight = Some(next);
        Ok(())
    }
}

fn write_frame<W: Write>(sink: &mut W, wire: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < wire.len() {
        match sink.write(&wire[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed.into()),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err).into()),
        }
    }

    loop {
        match sink.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::SessionError;

    type Log = Arc<Mutex<Vec<String>>>;

    fn command(code: &str, log: &Log) -> PendingCommand {
        let message = Message::parse_wire(code).unwrap();
        let wire = Bytes::from(format!("<{code}>"));
        let log = Arc::clone(log);
        let label = code.to_string();
        PendingCommand::new(
            message,
            wire,
            Some(Box::new(move || log.lock().unwrap().push(label))),
        )
    }

    #[test]
    fn first_write_transmits_immediately() {
        let log = Log::default();
        let mut queue = WriteQueue::new();
        let mut sink = Vec::new();

        queue.enqueue(&mut sink, command("PWR01", &log)).unwrap();

        assert_eq!(sink, b"<PWR01>");
        assert_eq!(queue.in_flight(), Some(&Message::new("PWR", "01")));
        assert_eq!(queue.pending_len(), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn later_writes_wait_for_next_frame_in_fifo_order() {
        let log = Log::default();
        let mut queue = WriteQueue::new();
        let mut sink = Vec::new();

        queue.enqueue(&mut sink, command("PWR01", &log)).unwrap();
        queue.enqueue(&mut sink, command("MVLUP", &log)).unwrap();
        queue.enqueue(&mut sink, command("AMT00", &log)).unwrap();
        assert_eq!(sink, b"<PWR01>");
        assert_eq!(queue.pending_len(), 2);

        queue.on_frame_consumed(&mut sink).unwrap();
        assert_eq!(sink, b"<PWR01><MVLUP>");
        assert_eq!(*log.lock().unwrap(), ["PWR01"]);

        queue.on_frame_consumed(&mut sink).unwrap();
        assert_eq!(sink, b"<PWR01><MVLUP><AMT00>");
        assert_eq!(*log.lock().unwrap(), ["PWR01", "MVLUP"]);

        queue.on_frame_consumed(&mut sink).unwrap();
        assert_eq!(*log.lock().unwrap(), ["PWR01", "MVLUP", "AMT00"]);
        assert!(queue.is_idle());
    }

    #[test]
    fn callback_fires_before_next_transmit() {
        let log = Log::default();
        let mut queue = WriteQueue::new();
        let mut sink = RecordingSink {
            log: Arc::clone(&log),
        };

        queue.enqueue(&mut sink, command("PWR01", &log)).unwrap();
        queue.enqueue(&mut sink, command("SLI10", &log)).unwrap();
        queue.on_frame_consumed(&mut sink).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            ["sent <PWR01>", "PWR01", "sent <SLI10>"]
        );
    }

    #[test]
    fn callback_fires_exactly_once() {
        let log = Log::default();
        let mut queue = WriteQueue::new();
        let mut sink = Vec::new();

        queue.enqueue(&mut sink, command("PWR01", &log)).unwrap();
        queue.on_frame_consumed(&mut sink).unwrap();
        queue.on_frame_consumed(&mut sink).unwrap();
        queue.on_frame_consumed(&mut sink).unwrap();

        assert_eq!(*log.lock().unwrap(), ["PWR01"]);
    }

    #[test]
    fn unsolicited_frames_are_harmless_when_idle() {
        let mut queue = WriteQueue::new();
        let mut sink = Vec::new();
        queue.on_frame_consumed(&mut sink).unwrap();
        assert!(sink.is_empty());
        assert!(queue.is_idle());
    }

    #[test]
    fn command_without_callback_still_advances() {
        let log = Log::default();
        let mut queue = WriteQueue::new();
        let mut sink = Vec::new();

        let silent = PendingCommand::new(
            Message::new("PWR", "QSTN"),
            Bytes::from_static(b"<PWRQSTN>"),
            None,
        );
        queue.enqueue(&mut sink, silent).unwrap();
        queue.enqueue(&mut sink, command("MVLUP", &log)).unwrap();
        queue.on_frame_consumed(&mut sink).unwrap();

        assert_eq!(sink, b"<PWRQSTN><MVLUP>");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let log = Log::default();
        let mut queue = WriteQueue::new();
        let err = queue
            .enqueue(&mut ZeroWriter, command("PWR01", &log))
            .unwrap_err();
        assert!(err.is_connection_closed());
        assert!(queue.in_flight().is_none());
        assert_eq!(queue.pending_len(), 1);
    }

    #[test]
    fn failed_transmit_keeps_command_for_retry() {
        let log = Log::default();
        let mut queue = WriteQueue::new();
        let mut sink = Vec::new();

        queue.enqueue(&mut sink, command("PWR01", &log)).unwrap();
        queue.enqueue(&mut sink, command("MVLUP", &log)).unwrap();

        // The in-flight command completes even though the next send fails.
        assert!(queue.on_frame_consumed(&mut BrokenWriter).is_err());
        assert_eq!(*log.lock().unwrap(), ["PWR01"]);
        assert!(queue.in_flight().is_none());
        assert_eq!(queue.pending_len(), 1);

        queue.on_frame_consumed(&mut sink).unwrap();
        assert_eq!(sink, b"<PWR01><MVLUP>");
        assert_eq!(queue.in_flight(), Some(&Message::new("MVL", "UP")));
        assert_eq!(*log.lock().unwrap(), ["PWR01"]);
    }

    #[test]
    fn interrupted_write_retries() {
        let log = Log::default();
        let mut queue = WriteQueue::new();
        let mut sink = InterruptedOnce {
            interrupted: false,
            data: Vec::new(),
        };

        queue.enqueue(&mut sink, command("PWR01", &log)).unwrap();
        assert_eq!(sink.data, b"<PWR01>");
    }

    #[test]
    fn hard_write_error_propagates() {
        let log = Log::default();
        let mut queue = WriteQueue::new();
        let err = queue
            .enqueue(&mut BrokenWriter, command("PWR01", &log))
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::Io(e)) if e.kind() == ErrorKind::BrokenPipe
        ));
    }

    struct RecordingSink {
        log: Log,
    }

    impl Write for RecordingSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.log
                .lock()
                .unwrap()
                .push(format!("sent {}", String::from_utf8_lossy(buf)));
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptedOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
