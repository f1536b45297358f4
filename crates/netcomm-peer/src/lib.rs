//! Connections, watchdog and listener for the netcomm frame protocol.
//!
//! A [`Connection`] wraps one TCP stream or UDP socket. Its receive loop runs
//! on a dedicated thread, feeds a [`netcomm_frame::FrameParser`] and reports
//! [`ConnectionEvent`]s to a callback. A [`Watchdog`] reports frames that
//! stay incomplete past the stall timeout. A [`Listener`] accepts TCP
//! clients and hands each one over as a new `Connection`.

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod event;
pub mod listener;
pub mod watchdog;

pub use config::{ConnectionConfig, DEFAULT_READ_BUFFER_SIZE, DEFAULT_STALL_TIMEOUT};
pub use connection::Connection;
pub use connector::{bind, bind_with_config, connect, connect_with_config, listen};
pub use error::{PeerError, Result};
pub use event::{ConnectionEvent, EventHandler};
pub use listener::{Listener, ListenerHandle};
pub use watchdog::Watchdog;
