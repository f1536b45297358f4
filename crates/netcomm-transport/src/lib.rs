//! Unified socket transport for netcomm.
//!
//! Provides one interface over the two transports the protocol runs on:
//! - TCP streams (connected, ordered byte stream)
//! - UDP datagrams (bound socket, per-datagram sender address)
//!
//! This is the lowest layer of netcomm. Everything else builds on top of
//! the [`NetSocket`] type provided here.

pub mod error;
pub mod socket;
pub mod tcp;

pub use error::{Result, TransportError};
pub use socket::{NetSocket, Protocol};
pub use tcp::{bind_udp, TcpTransport};
