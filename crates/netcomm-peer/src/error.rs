/// Errors that can occur in connection and listener operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] netcomm_transport::TransportError),

    /// Frame encoding error.
    #[error("frame error: {0}")]
    Frame(#[from] netcomm_frame::FrameError),

    /// I/O error outside the transport layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A receive, accept or watchdog thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// The connection was closed locally.
    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, PeerError>;
