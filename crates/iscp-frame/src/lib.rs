//! ISCP and eISCP message framing for Onkyo/Integra receivers.
//!
//! Every logical message is a 3-character command plus a free-form argument.
//! On the wire it travels as `"!1" + command + argument + terminator`, either
//! raw (ISCP, serial) or wrapped in a 16-byte big-endian header (eISCP, TCP
//! and UDP).
//!
//! Decoding is incremental: callers keep a growing buffer and decode
//! repeatedly; partial frames are never errors.

pub mod codec;
pub mod error;
pub mod reader;

pub use codec::{
    decode_frame, discovery_query, encode_eiscp_body, encode_frame, Decoded, FrameConfig,
    FrameWarning, Message, Protocol, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
