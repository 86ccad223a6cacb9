//! Byte-stream transports for Onkyo/Integra receivers.
//!
//! Receivers are reached either through an RS-232 port (raw ISCP framing) or
//! a TCP socket (eISCP framing). Both are exposed as a [`DeviceStream`], which
//! only knows how to read, write, and bound a blocking read with a timeout.
//!
//! This is the lowest layer of iscp. Everything else builds on the
//! [`Transport`] trait provided here.

pub mod endpoint;
pub mod error;
pub mod traits;

pub use endpoint::{open, open_serial, open_tcp, Endpoint, SerialSettings, DEFAULT_PORT};
pub use error::{Result, TransportError};
pub use traits::{DeviceStream, Transport};
