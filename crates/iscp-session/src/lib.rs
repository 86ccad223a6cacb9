//! Receiver sessions for Onkyo/Integra AV receivers.
//!
//! A [`Session`] owns one transport, decodes incoming frames, and serializes
//! outgoing commands through a [`WriteQueue`]: at most one command is in
//! flight, and it counts as complete as soon as the next frame arrives.
//! [`discover`] locates a receiver on the LAN with an eISCP broadcast.

pub mod commands;
pub mod discovery;
pub mod error;
pub mod queue;
pub mod session;

pub use commands::CommandTable;
pub use discovery::{
    discover, discover_with_config, parse_reply, DiscoveredDevice, DiscoveryConfig,
    DEFAULT_DISCOVERY_TIMEOUT,
};
pub use error::{Result, SessionError};
pub use iscp_frame::{Message, Protocol};
pub use queue::{Completion, PendingCommand, WriteQueue};
pub use session::{Session, SessionConfig};
