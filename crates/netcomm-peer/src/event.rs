use std::net::SocketAddr;
use std::sync::Arc;

use netcomm_frame::{DecodeError, Frame};

/// Notification emitted by a connection's receive loop or its watchdog.
///
/// `remote` is the connected peer for stream sockets and the sender of the
/// most recent datagram for datagram sockets.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A complete, checksum-validated frame arrived.
    FrameReceived {
        frame: Frame,
        remote: Option<SocketAddr>,
    },
    /// The peer disconnected or the socket was closed. The loop has stopped.
    Closed { remote: Option<SocketAddr> },
    /// The byte stream violated the wire format. The loop has stopped; the
    /// socket is left open.
    ParseError {
        error: DecodeError,
        remote: Option<SocketAddr>,
    },
    /// A frame has stayed incomplete past the stall timeout. Reading
    /// continues.
    ///
    /// Delivered from the watchdog thread. It always precedes the
    /// `FrameReceived` that completes the stalled frame and any terminal
    /// event, but a frame that completes just after the timeout still
    /// produces it, so treat it as advisory.
    Interrupted { remote: Option<SocketAddr> },
}

impl ConnectionEvent {
    pub fn remote(&self) -> Option<SocketAddr> {
        match self {
            ConnectionEvent::FrameReceived { remote, .. }
            | ConnectionEvent::Closed { remote }
            | ConnectionEvent::ParseError { remote, .. }
            | ConnectionEvent::Interrupted { remote } => *remote,
        }
    }

    /// Whether the receive loop stops after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConnectionEvent::Closed { .. } | ConnectionEvent::ParseError { .. }
        )
    }
}

/// Shared callback invoked for every [`ConnectionEvent`].
///
/// Called from the receive thread and from watchdog threads.
pub type EventHandler = Arc<dyn Fn(ConnectionEvent) + Send + Sync>;
