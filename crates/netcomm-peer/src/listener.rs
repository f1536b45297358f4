use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use netcomm_transport::TcpTransport;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{PeerError, Result};

// Pause after a failed accept so persistent errors (fd exhaustion) do not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Listens for and accepts TCP connections.
pub struct Listener {
    transport: TcpTransport,
    config: ConnectionConfig,
    stop: Arc<AtomicBool>,
}

impl Listener {
    /// Bind and listen on a `host:port` address.
    pub fn bind(addr: &str) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        Ok(Self {
            transport,
            config: ConnectionConfig::default(),
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Configuration applied to every accepted connection.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Accept the next connection (blocking).
    pub fn accept(&self) -> Result<Connection> {
        let socket = self.transport.accept()?;
        Connection::with_config(socket, self.config.clone())
    }

    /// Accept connections on the calling thread until stopped, handing each
    /// one to `on_accept`. Accept failures are logged and skipped.
    pub fn run_accept_loop<F>(&self, mut on_accept: F)
    where
        F: FnMut(Connection),
    {
        let local_addr = self.local_addr();
        info!(%local_addr, "accept loop started");

        while !self.stop.load(Ordering::Acquire) {
            match self.accept() {
                Ok(conn) => {
                    if self.stop.load(Ordering::Acquire) {
                        break;
                    }
                    debug!(remote = ?conn.peer_addr(), "connection accepted");
                    on_accept(conn);
                }
                Err(err) => {
                    if self.stop.load(Ordering::Acquire) {
                        break;
                    }
                    warn!(error = %err, "accept failed");
                    thread::sleep(ACCEPT_ERROR_BACKOFF);
                }
            }
        }

        debug!(%local_addr, "accept loop stopped");
    }

    /// Run the accept loop on its own thread.
    pub fn spawn_accept_loop<F>(self, on_accept: F) -> Result<ListenerHandle>
    where
        F: FnMut(Connection) + Send + 'static,
    {
        let local_addr = self.local_addr();
        let stop = Arc::clone(&self.stop);

        let thread = thread::Builder::new()
            .name(format!("netcomm-accept-{}", local_addr.port()))
            .spawn(move || self.run_accept_loop(on_accept))
            .map_err(|source| PeerError::Spawn {
                name: "accept",
                source,
            })?;

        Ok(ListenerHandle {
            local_addr,
            stop,
            thread: Some(thread),
        })
    }
}

/// Handle to an accept loop running on its own thread.
///
/// Dropping the handle stops the loop.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting and wait for the accept thread to exit.
    ///
    /// Connections already handed out are unaffected.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);

        // Wake the blocking accept; the loop sees the flag and drops this stream.
        if let Err(err) = TcpStream::connect_timeout(&wake_addr(self.local_addr), Duration::from_secs(1)) {
            debug!(error = %err, "listener wake-up connect failed");
        }
        if thread.join().is_err() {
            warn!("accept thread panicked");
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn wake_addr(local: SocketAddr) -> SocketAddr {
    match local.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local.port())
        }
        _ => local,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use netcomm_frame::{Frame, Value};

    use super::*;
    use crate::connector::connect;
    use crate::event::ConnectionEvent;

    #[test]
    fn accept_returns_connection() {
        let listener = Listener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().to_string();

        let client = thread::spawn(move || connect(&addr).expect("client should connect"));
        let server = listener.accept().expect("listener should accept");
        let client = client.join().expect("client thread should finish");

        assert_eq!(server.peer_addr(), Some(client.local_addr()));
        assert_eq!(server.local_addr(), listener.local_addr());
    }

    #[test]
    fn accept_loop_hands_out_connections_until_shutdown() {
        let listener = Listener::bind("127.0.0.1:0").expect("listener should bind");
        let addr = listener.local_addr().to_string();

        let (tx, rx) = mpsc::channel();
        let handle = listener
            .spawn_accept_loop(move |conn| {
                let events = tx.clone();
                conn.spawn_receiver(move |event| {
                    let _ = events.send(event);
                })
                .expect("receiver should start");
            })
            .expect("accept loop should start");

        let first = connect(&addr).expect("first client should connect");
        let second = connect(&addr).expect("second client should connect");
        first.send_frame(1, &[Value::text("one")]).unwrap();
        second.send_frame(2, &[Value::text("two")]).unwrap();

        let mut received = Vec::new();
        for _ in 0..2 {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                ConnectionEvent::FrameReceived { frame, .. } => received.push(frame),
                other => panic!("unexpected event {other:?}"),
            }
        }
        received.sort_by_key(|frame| frame.command);
        assert_eq!(
            received,
            vec![
                Frame::new(1, vec![Value::text("one")]),
                Frame::new(2, vec![Value::text("two")]),
            ]
        );

        let local = handle.local_addr();
        handle.shutdown();
        let refused = TcpStream::connect_timeout(&local, Duration::from_millis(500));
        assert!(refused.is_err(), "listener should be closed after shutdown");
    }

    #[test]
    fn shutdown_without_clients_returns() {
        let listener = Listener::bind("127.0.0.1:0").expect("listener should bind");
        let handle = listener
            .spawn_accept_loop(|_conn| panic!("no connection expected"))
            .expect("accept loop should start");
        handle.shutdown();
    }

    #[test]
    fn accepted_connections_use_listener_config() {
        let config = ConnectionConfig::default().with_stall_timeout(Duration::from_millis(75));
        let listener = Listener::bind("127.0.0.1:0")
            .expect("listener should bind")
            .with_config(config);
        let addr = listener.local_addr().to_string();

        let client = thread::spawn(move || connect(&addr).expect("client should connect"));
        let server = listener.accept().expect("listener should accept");
        let _client = client.join().expect("client thread should finish");

        assert_eq!(server.config().stall_timeout, Duration::from_millis(75));
    }

    #[test]
    fn wake_addr_maps_unspecified_to_loopback() {
        let any: SocketAddr = "0.0.0.0:4000".parse().unwrap();
        assert_eq!(wake_addr(any), "127.0.0.1:4000".parse().unwrap());
        let any6: SocketAddr = "[::]:4000".parse().unwrap();
        assert_eq!(wake_addr(any6), "[::1]:4000".parse().unwrap());
        let fixed: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        assert_eq!(wake_addr(fixed), fixed);
    }
}
