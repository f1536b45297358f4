use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::BytesMut;
use netcomm_frame::{encode_frame, Advance, FrameParser, Value};
use netcomm_transport::{NetSocket, Protocol};
use tracing::{debug, trace, warn};

use crate::config::{ConnectionConfig, DATAGRAM_POLL_INTERVAL};
use crate::error::{PeerError, Result};
use crate::event::{ConnectionEvent, EventHandler};
use crate::watchdog::Watchdog;

/// One TCP stream or UDP socket speaking the frame protocol.
///
/// Sending is synchronous and may be done from any thread. Receiving runs on
/// a dedicated thread started by [`spawn_receiver`](Connection::spawn_receiver)
/// that reports [`ConnectionEvent`]s to a callback.
///
/// Clones made with [`try_clone`](Connection::try_clone) share the closed
/// flag, so closing any clone stops the receive loop.
#[derive(Debug)]
pub struct Connection {
    socket: NetSocket,
    local_addr: SocketAddr,
    config: ConnectionConfig,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Wrap a socket with default configuration.
    pub fn new(socket: NetSocket) -> Result<Self> {
        Self::with_config(socket, ConnectionConfig::default())
    }

    /// Wrap a socket and apply the configured write timeout.
    pub fn with_config(socket: NetSocket, config: ConnectionConfig) -> Result<Self> {
        socket.set_write_timeout(config.write_timeout)?;
        let local_addr = socket.local_addr()?;
        Ok(Self {
            socket,
            local_addr,
            config,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.socket.protocol()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Remote address of a stream connection; `None` for datagram sockets.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.socket.peer_addr()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send raw bytes (blocking). Datagram sockets need a connected peer;
    /// use [`send_to`](Connection::send_to) otherwise.
    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.socket.send(data, None)?;
        trace!(len = data.len(), "sent bytes");
        Ok(())
    }

    /// Send raw bytes to an explicit destination. Stream sockets ignore `dest`.
    pub fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<()> {
        self.ensure_open()?;
        self.socket.send(data, Some(dest))?;
        trace!(len = data.len(), %dest, "sent bytes");
        Ok(())
    }

    /// Encode and send one frame. Nothing is sent if encoding fails.
    pub fn send_frame(&self, command: i64, values: &[Value]) -> Result<()> {
        let mut buf = BytesMut::new();
        encode_frame(command, values, &mut buf)?;
        self.send(&buf)
    }

    /// Encode and send one frame to an explicit destination.
    pub fn send_frame_to(&self, command: i64, values: &[Value], dest: SocketAddr) -> Result<()> {
        let mut buf = BytesMut::new();
        encode_frame(command, values, &mut buf)?;
        self.send_to(&buf, dest)
    }

    /// Clone the connection. The clone shares the socket and the closed flag.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            local_addr: self.local_addr,
            config: self.config.clone(),
            closed: Arc::clone(&self.closed),
        })
    }

    /// Close the connection and unblock its receive loop.
    ///
    /// Stream sockets are shut down in both directions. Datagram receivers
    /// notice within their read timeout.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(protocol = %self.protocol(), local = %self.local_addr, "closing connection");
        self.socket.shutdown()?;
        Ok(())
    }

    /// Start the receive loop on its own thread.
    ///
    /// The loop ends after emitting exactly one `Closed` or `ParseError`
    /// event; join the returned handle to wait for it.
    pub fn spawn_receiver<F>(&self, handler: F) -> Result<JoinHandle<()>>
    where
        F: Fn(ConnectionEvent) + Send + Sync + 'static,
    {
        let receiver = self.try_clone()?;
        receiver.prepare_receive()?;
        let handler: EventHandler = Arc::new(handler);

        thread::Builder::new()
            .name(format!("netcomm-recv-{}", self.local_addr.port()))
            .spawn(move || receiver.receive_loop(&handler))
            .map_err(|source| PeerError::Spawn {
                name: "receive",
                source,
            })
    }

    /// Run the receive loop on the calling thread until it terminates.
    pub fn run_receiver<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(ConnectionEvent) + Send + Sync + 'static,
    {
        self.prepare_receive()?;
        let handler: EventHandler = Arc::new(handler);
        self.receive_loop(&handler);
        Ok(())
    }

    fn prepare_receive(&self) -> Result<()> {
        let timeout = match self.protocol() {
            Protocol::Udp => self.config.read_timeout.or(Some(DATAGRAM_POLL_INTERVAL)),
            Protocol::Tcp => self.config.read_timeout,
        };
        self.socket.set_read_timeout(timeout)?;
        Ok(())
    }

    fn receive_loop(&self, handler: &EventHandler) {
        let source = SocketSource {
            socket: &self.socket,
        };
        let scratch = self
            .config
            .scratch_size(self.protocol() == Protocol::Udp);
        run_receive_loop(
            source,
            scratch,
            &self.config,
            &self.closed,
            self.peer_addr(),
            handler,
        );
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PeerError::Closed);
        }
        Ok(())
    }
}

/// Blocking byte source feeding a receive loop.
pub(crate) trait RecvSource {
    /// Read into `buf`, returning the byte count and the sender if known.
    fn recv_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<(usize, Option<SocketAddr>)>;
}

struct SocketSource<'a> {
    socket: &'a NetSocket,
}

impl RecvSource for SocketSource<'_> {
    fn recv_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<(usize, Option<SocketAddr>)> {
        self.socket.recv(buf)
    }
}

pub(crate) fn run_receive_loop<S: RecvSource>(
    mut source: S,
    scratch_size: usize,
    config: &ConnectionConfig,
    closed: &AtomicBool,
    mut remote: Option<SocketAddr>,
    handler: &EventHandler,
) {
    let mut parser = FrameParser::with_config(config.frame.clone());
    let watchdog = Watchdog::new(config.stall_timeout);
    let mut scratch = vec![0u8; scratch_size];

    loop {
        let (read, from) = match source.recv_chunk(&mut scratch) {
            Ok(result) => result,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                if closed.load(Ordering::Acquire) {
                    break;
                }
                continue;
            }
            Err(err) => {
                if !closed.load(Ordering::Acquire) {
                    debug!(error = %err, "receive failed");
                }
                break;
            }
        };

        if from.is_some() {
            remote = from;
        }
        if read == 0 {
            break;
        }
        trace!(read, ?remote, "received bytes");

        parser.append(&scratch[..read]);
        loop {
            match parser.advance() {
                Ok(Advance::FrameReady(frame)) => {
                    watchdog.frame_completed();
                    handler(ConnectionEvent::FrameReceived { frame, remote });
                }
                Ok(Advance::StillAccumulating) => {
                    watchdog.arm(remote, handler);
                    break;
                }
                Ok(Advance::NeedMoreData) => break,
                Err(error) => {
                    watchdog.disarm();
                    warn!(%error, ?remote, "frame decode failed, stopping receive loop");
                    handler(ConnectionEvent::ParseError { error, remote });
                    return;
                }
            }
        }
    }

    watchdog.disarm();
    debug!(?remote, "receive loop closed");
    handler(ConnectionEvent::Closed { remote });
}
