use std::fmt;
use std::io;

use iscp_frame::FrameError;
use iscp_session::SessionError;
use iscp_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::NotFound => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, endpoint } => {
            io_error(&format!("{context} ({endpoint})"), source)
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::InvalidMagic { .. }
        | FrameError::InvalidHeaderSize { .. }
        | FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::InvalidMessage(_) => CliError::new(USAGE, format!("{context}: {err}")),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Io(err) => io_error(context, err),
        SessionError::UnknownCommand(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::DiscoveryTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::InvalidCommandTable(_)
        | SessionError::Json(_)
        | SessionError::Protocol(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn maps_session_errors_to_exit_codes() {
        let cases = [
            (SessionError::UnknownCommand("x".into()), USAGE),
            (SessionError::DiscoveryTimeout(Duration::from_secs(1)), TIMEOUT),
            (SessionError::Protocol("bad".into()), DATA_INVALID),
            (SessionError::Frame(FrameError::ConnectionClosed), FAILURE),
            (
                SessionError::Frame(FrameError::InvalidMagic { found: *b"XXXX" }),
                DATA_INVALID,
            ),
            (
                SessionError::Frame(FrameError::InvalidHeaderSize { size: 0 }),
                DATA_INVALID,
            ),
            (
                SessionError::Transport(TransportError::InvalidEndpoint(String::new())),
                USAGE,
            ),
        ];
        for (err, code) in cases {
            let label = err.to_string();
            assert_eq!(session_error("ctx", err).code, code, "{label}");
        }
    }

    #[test]
    fn open_failures_use_the_io_kind() {
        let err = TransportError::Open {
            endpoint: "10.0.0.9:60128".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        let mapped = transport_error("connect failed", err);
        assert_eq!(mapped.code, TRANSPORT_ERROR);
        assert!(mapped.message.contains("10.0.0.9:60128"));

        let timed_out = TransportError::Open {
            endpoint: "10.0.0.9:60128".into(),
            source: io::Error::from(io::ErrorKind::TimedOut),
        };
        assert_eq!(transport_error("connect failed", timed_out).code, TIMEOUT);
    }
}
