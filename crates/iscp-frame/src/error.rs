/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An eISCP header did not start with "ISCP"; the stream is desynchronized
    /// and the connection must be reopened.
    #[error("invalid eISCP magic {found:02x?} (expected \"ISCP\")")]
    InvalidMagic { found: [u8; 4] },

    /// An eISCP header declared itself shorter than the 16 bytes it occupies;
    /// the stream is desynchronized and the connection must be reopened.
    #[error("invalid eISCP header size {size} (minimum 16)")]
    InvalidHeaderSize { size: u32 },

    /// A declared header or payload size, or an unterminated ISCP frame,
    /// exceeds the configured maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The message cannot be represented on the wire.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport reported end-of-stream.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
