use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use iscp_transport::Endpoint;

use crate::error::{FrameError, Result};

/// eISCP header: magic (4) + header size (4) + data size (4) + version (1) + reserved (3).
pub const HEADER_SIZE: usize = 16;

/// Magic bytes: "ISCP".
pub const MAGIC: [u8; 4] = *b"ISCP";

/// eISCP protocol version emitted in every header.
pub const VERSION: u8 = 0x01;

/// Start character of every message body.
pub const START: u8 = b'!';

/// Destination unit type for receivers.
pub const UNIT_RECEIVER: u8 = b'1';

/// Destination unit type matching any device; used by discovery.
pub const UNIT_ANY: u8 = b'x';

/// Length of a command code.
pub const COMMAND_LEN: usize = 3;

/// Bytes that end an ISCP message: EOF (0x1A), CR, LF.
pub const TERMINATORS: [u8; 3] = [0x1A, b'\r', b'\n'];

/// Default maximum eISCP header or data size: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

const MARKER: [u8; 2] = [START, UNIT_RECEIVER];

/// Wire variant spoken on a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Raw terminator-delimited frames (serial).
    Iscp,
    /// Length-prefixed frames with a 16-byte header (TCP/UDP).
    Eiscp,
}

impl Protocol {
    /// The variant a receiver speaks on the given endpoint.
    pub fn for_endpoint(endpoint: &Endpoint) -> Self {
        if endpoint.is_serial() {
            Self::Iscp
        } else {
            Self::Eiscp
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Iscp => "iscp",
            Self::Eiscp => "eiscp",
        }
    }
}

/// A logical receiver message: command code plus argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    /// Three-character command code, e.g. `PWR`.
    pub command: String,
    /// Argument, e.g. `01` or `QSTN`. May be empty.
    pub argument: String,
}

impl Message {
    pub fn new(command: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            argument: argument.into(),
        }
    }

    /// Split a joined wire code such as `MVLUP` into command and argument.
    ///
    /// Returns `None` when the code is shorter than a command.
    pub fn parse_wire(code: &str) -> Option<Self> {
        if !code.is_char_boundary(COMMAND_LEN) {
            return None;
        }
        let (command, argument) = code.split_at(COMMAND_LEN);
        Some(Self::new(command, argument))
    }

    fn validate(&self) -> Result<()> {
        if self.command.len() != COMMAND_LEN || !self.command.is_ascii() {
            return Err(FrameError::InvalidMessage(format!(
                "command '{}' must be {COMMAND_LEN} ASCII characters",
                self.command
            )));
        }
        if self.argument.bytes().any(is_terminator) {
            return Err(FrameError::InvalidMessage(format!(
                "argument of {} contains a terminator byte",
                self.command
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.command, self.argument)
    }
}

/// A non-fatal deviation observed while decoding. Decoding proceeds using
/// the observed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameWarning {
    /// The body did not start with `!1`.
    UnexpectedMarker { found: String },
    /// The eISCP header carried a version other than 0x01.
    UnexpectedVersion { found: u8 },
    /// The eISCP header declared a header size other than 16.
    UnexpectedHeaderSize { found: u32 },
    /// The body was too short to hold a full command code.
    ShortBody { len: usize },
}

impl fmt::Display for FrameWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedMarker { found } => {
                write!(f, "unexpected start/destination marker {found:?}")
            }
            Self::UnexpectedVersion { found } => {
                write!(f, "unexpected eISCP version {found:#04x}")
            }
            Self::UnexpectedHeaderSize { found } => {
                write!(f, "unexpected eISCP header size {found}")
            }
            Self::ShortBody { len } => write!(f, "message body too short ({len} bytes)"),
        }
    }
}

/// One decoded message and the warnings raised while decoding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub message: Message,
    pub warnings: Vec<FrameWarning>,
}

/// Encode a message for the given wire variant.
///
/// ```text
/// ISCP:   "!1" CMD ARG "\r\n"
///
/// eISCP:  ┌────────┬─────────────┬───────────┬─────────┬──────────┬──────────────────────┐
///         │ "ISCP" │ header size │ data size │ version │ reserved │ "!1" CMD ARG "\r"    │
///         │  (4B)  │  (4B BE)=16 │  (4B BE)  │ (1B)=1  │  (3B)=0  │ (data size bytes)    │
///         └────────┴─────────────┴───────────┴─────────┴──────────┴──────────────────────┘
/// ```
pub fn encode_frame(protocol: Protocol, message: &Message, dst: &mut BytesMut) -> Result<()> {
    message.validate()?;

    let body_len = MARKER.len() + message.command.len() + message.argument.len();
    match protocol {
        Protocol::Iscp => {
            dst.reserve(body_len + 2);
            put_body(message, dst);
            dst.put_slice(b"\r\n");
        }
        Protocol::Eiscp => {
            let mut body = BytesMut::with_capacity(body_len + 1);
            put_body(message, &mut body);
            body.put_u8(b'\r');
            encode_eiscp_body(&body, dst)?;
        }
    }
    Ok(())
}

fn put_body(message: &Message, dst: &mut BytesMut) {
    dst.put_slice(&MARKER);
    dst.put_slice(message.command.as_bytes());
    dst.put_slice(message.argument.as_bytes());
}

/// Wrap an already-terminated body in an eISCP header.
pub fn encode_eiscp_body(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let data_size = u32::try_from(body.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: body.len(),
        max: u32::MAX as usize,
    })?;

    dst.reserve(HEADER_SIZE + body.len());
    put_header(data_size, dst);
    dst.put_slice(body);
    Ok(())
}

fn put_header(data_size: u32, dst: &mut BytesMut) {
    dst.put_slice(&MAGIC);
    dst.put_u32(HEADER_SIZE as u32);
    dst.put_u32(data_size);
    dst.put_u8(VERSION);
    dst.put_bytes(0, 3);
}

/// The eISCP discovery query: `"!xECNQSTN\r\n"` addressed to any unit.
pub fn discovery_query() -> Bytes {
    const BODY: &[u8] = b"!xECNQSTN\r\n";

    let mut dst = BytesMut::with_capacity(HEADER_SIZE + BODY.len());
    put_header(BODY.len() as u32, &mut dst);
    dst.put_slice(BODY);
    dst.freeze()
}

/// Decode one message from the front of `src`.
///
/// Returns `Ok(None)` when `src` does not yet hold a complete frame; the
/// buffer is left untouched in that case. On success, exactly the frame's
/// bytes are consumed and any following bytes stay buffered.
pub fn decode_frame(
    protocol: Protocol,
    src: &mut BytesMut,
    max_payload: usize,
) -> Result<Option<Decoded>> {
    match protocol {
        Protocol::Iscp => decode_iscp(src, max_payload),
        Protocol::Eiscp => decode_eiscp(src, max_payload),
    }
}

fn decode_iscp(src: &mut BytesMut, max_payload: usize) -> Result<Option<Decoded>> {
    // Terminators left over from a frame whose terminator run was split
    // across reads belong to that frame; they go with the next extraction.
    let skip = src.iter().take_while(|b| is_terminator(**b)).count();
    let frame = &src[skip..];

    let Some(end) = frame.iter().position(|b| is_terminator(*b)) else {
        if frame.len() > max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: frame.len(),
                max: max_payload,
            });
        }
        return Ok(None); // Need more data
    };
    let run = frame[end..].iter().take_while(|b| is_terminator(**b)).count();

    // Line noise shorter than marker plus command still ends at its own
    // terminator, so it never swallows the frame after it.
    let mut warnings = Vec::new();
    let message = split_body(&frame[..end], &mut warnings);

    src.advance(skip + end + run);
    Ok(Some(Decoded { message, warnings }))
}

fn decode_eiscp(src: &mut BytesMut, max_payload: usize) -> Result<Option<Decoded>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    if src[0..4] != MAGIC {
        let mut found = [0u8; 4];
        found.copy_from_slice(&src[0..4]);
        return Err(FrameError::InvalidMagic { found });
    }

    let header_size = read_u32_be(&src[4..8]);
    let data_size = read_u32_be(&src[8..12]);
    let version = src[12];

    if (header_size as usize) < HEADER_SIZE {
        return Err(FrameError::InvalidHeaderSize { size: header_size });
    }

    for size in [header_size as usize, data_size as usize] {
        if size > max_payload {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: max_payload,
            });
        }
    }

    let total = header_size as usize + data_size as usize;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let mut warnings = Vec::new();
    if header_size as usize != HEADER_SIZE {
        warnings.push(FrameWarning::UnexpectedHeaderSize { found: header_size });
    }
    if version != VERSION {
        warnings.push(FrameWarning::UnexpectedVersion { found: version });
    }

    src.advance(header_size as usize);
    let body = src.split_to(data_size as usize);
    let message = split_body(&body, &mut warnings);

    Ok(Some(Decoded { message, warnings }))
}

fn split_body(body: &[u8], warnings: &mut Vec<FrameWarning>) -> Message {
    check_marker(&body[..body.len().min(2)], warnings);
    let rest = body.get(2..).unwrap_or_default();
    let rest = trim_terminators(rest);

    if rest.len() < COMMAND_LEN {
        warnings.push(FrameWarning::ShortBody { len: body.len() });
        return Message::new(String::from_utf8_lossy(rest), "");
    }

    let (command, argument) = rest.split_at(COMMAND_LEN);
    Message::new(
        String::from_utf8_lossy(command),
        String::from_utf8_lossy(argument),
    )
}

fn check_marker(marker: &[u8], warnings: &mut Vec<FrameWarning>) {
    if marker != MARKER {
        warnings.push(FrameWarning::UnexpectedMarker {
            found: String::from_utf8_lossy(marker).into_owned(),
        });
    }
}

fn trim_terminators(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !is_terminator(*b))
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_be_bytes(raw)
}

fn is_terminator(byte: u8) -> bool {
    TERMINATORS.contains(&byte)
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum eISCP header or data size, and maximum length of an
    /// unterminated ISCP frame, in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
