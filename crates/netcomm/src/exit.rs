use std::fmt;
use std::io;

use netcomm_frame::FrameError;
use netcomm_peer::PeerError;
use netcomm_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::MissingDestination => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        FrameError::CommandOutOfRange { .. }
        | FrameError::StringTooLong { .. }
        | FrameError::ByteArrayTooLong { .. }
        | FrameError::UnsupportedValueType(_)
        | FrameError::FrameTooLarge { .. }
        | FrameError::InvalidValue { .. }
        | FrameError::Decode(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Io(err) => io_error(context, err),
        PeerError::Closed => CliError::new(FAILURE, format!("{context}: {err}")),
        other @ PeerError::Spawn { .. } => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_errors_are_data_invalid() {
        let err = frame_error("send failed", FrameError::CommandOutOfRange { command: 256 });
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("send failed: command 256"));
    }

    #[test]
    fn refused_connect_is_failure() {
        let err = peer_error(
            "connect failed",
            PeerError::Transport(TransportError::Connect {
                addr: "127.0.0.1:1".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
        );
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn timeouts_map_to_124() {
        let err = io_error("wait", io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn missing_destination_is_usage() {
        let err = transport_error("send failed", TransportError::MissingDestination);
        assert_eq!(err.code, USAGE);
    }
}
