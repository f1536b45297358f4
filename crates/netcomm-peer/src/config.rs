use std::time::Duration;

use netcomm_frame::FrameConfig;

/// Default delay before a stalled frame is reported as interrupted.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Default receive scratch buffer size for stream sockets.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Largest UDP payload; datagram sockets always read with a buffer this big.
pub const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Read timeout applied to datagram receivers when none is configured, so
/// the loop can observe [`crate::Connection::close`].
pub const DATAGRAM_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Connection behavior configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long a frame may stay incomplete before an `Interrupted` event.
    pub stall_timeout: Duration,
    /// Receive scratch buffer size for stream sockets.
    pub read_buffer_size: usize,
    /// Socket read timeout. Timeouts are retried by the receive loop.
    pub read_timeout: Option<Duration>,
    /// Socket write timeout for sends.
    pub write_timeout: Option<Duration>,
    /// Parser limits.
    pub frame: FrameConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            read_timeout: None,
            write_timeout: None,
            frame: FrameConfig::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: Option<Duration>) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    // Zero-sized reads would look like EOF.
    pub(crate) fn scratch_size(&self, datagram: bool) -> usize {
        if datagram {
            MAX_DATAGRAM_SIZE
        } else {
            self.read_buffer_size.max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ConnectionConfig::default();
        assert_eq!(cfg.stall_timeout, Duration::from_secs(15));
        assert_eq!(cfg.read_buffer_size, 4096);
        assert!(cfg.read_timeout.is_none());
        assert!(cfg.write_timeout.is_none());
        assert_eq!(cfg.frame.max_text_len, netcomm_frame::TXT_MAXLEN);
    }

    #[test]
    fn builders_override_fields() {
        let cfg = ConnectionConfig::default()
            .with_stall_timeout(Duration::from_millis(50))
            .with_read_timeout(Some(Duration::from_millis(10)))
            .with_frame_config(FrameConfig {
                max_text_len: 64,
                ..FrameConfig::default()
            });
        assert_eq!(cfg.stall_timeout, Duration::from_millis(50));
        assert_eq!(cfg.read_timeout, Some(Duration::from_millis(10)));
        assert_eq!(cfg.frame.max_text_len, 64);
    }

    #[test]
    fn scratch_size_by_socket_kind() {
        let cfg = ConnectionConfig {
            read_buffer_size: 0,
            ..ConnectionConfig::default()
        };
        assert_eq!(cfg.scratch_size(false), 1);
        assert_eq!(cfg.scratch_size(true), MAX_DATAGRAM_SIZE);
    }
}
