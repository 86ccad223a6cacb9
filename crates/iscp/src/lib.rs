//! Control Onkyo/Integra AV receivers over ISCP and eISCP.
//!
//! Receivers speak ISCP on their RS-232 port and eISCP (ISCP wrapped in a
//! 16-byte header) on TCP port 60128.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial and TCP transports, device descriptor parsing
//! - [`frame`]: ISCP/eISCP encoding and incremental decoding
//! - [`session`]: sessions with write flow control, command table, discovery (behind `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use iscp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use iscp_frame::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use iscp_session::*;
}
