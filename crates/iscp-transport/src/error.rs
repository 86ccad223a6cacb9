/// Errors that can occur while opening or driving a receiver transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The device descriptor could not be interpreted.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Failed to open the serial device or connect the TCP socket.
    #[error("failed to open {endpoint}: {source}")]
    Open {
        endpoint: String,
        source: std::io::Error,
    },

    /// Serial port configuration or control failure.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
