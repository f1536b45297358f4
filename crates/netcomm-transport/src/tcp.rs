use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::socket::NetSocket;

/// TCP listening socket.
///
/// Provides bind/accept/connect over `host:port` addresses. Accepted and
/// connected streams are returned as [`NetSocket`].
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on a `host:port` address.
    ///
    /// Port `0` asks the OS for an ephemeral port; see [`TcpTransport::local_addr`].
    pub fn bind(addr: &str) -> Result<Self> {
        let candidates = resolve(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        let listener =
            TcpListener::bind(&candidates[..]).map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(%local_addr, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<NetSocket> {
        let (stream, remote) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%remote, "accepted connection");
        Ok(NetSocket::from(stream))
    }

    /// Connect to a listening TCP socket (blocking).
    pub fn connect(addr: &str) -> Result<NetSocket> {
        let candidates = resolve(addr).map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;

        let stream =
            TcpStream::connect(&candidates[..]).map_err(|source| TransportError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        debug!(addr, "connected to tcp socket");
        Ok(NetSocket::from(stream))
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Bind a UDP socket on a `host:port` address.
pub fn bind_udp(addr: &str) -> Result<NetSocket> {
    let candidates = resolve(addr).map_err(|source| TransportError::Bind {
        addr: addr.to_string(),
        source,
    })?;

    let socket = UdpSocket::bind(&candidates[..]).map_err(|source| TransportError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    debug!(local_addr = ?socket.local_addr().ok(), "bound udp socket");
    Ok(NetSocket::from(socket))
}

fn resolve(addr: &str) -> std::io::Result<Vec<SocketAddr>> {
    let candidates: Vec<SocketAddr> = addr.to_socket_addrs()?.collect();
    if candidates.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "address did not resolve",
        ));
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_accept_connect() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        assert_ne!(listener.local_addr().port(), 0);

        let handle = std::thread::spawn(move || {
            let client = TcpTransport::connect(&addr).unwrap();
            client.send(b"hello", None).unwrap();
        });

        let server = listener.accept().unwrap();
        let mut buf = [0u8; 5];
        let mut filled = 0;
        while filled < buf.len() {
            let (n, _) = server.recv(&mut buf[filled..]).unwrap();
            assert!(n > 0);
            filled += n;
        }
        assert_eq!(&buf, b"hello");

        handle.join().unwrap();
    }

    #[test]
    fn test_bind_rejects_unresolvable_address() {
        let result = TcpTransport::bind("not an address");
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }

    #[test]
    fn test_connect_refused_reports_address() {
        let listener = TcpTransport::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().to_string();
        drop(listener);

        let err = TcpTransport::connect(&addr).unwrap_err();
        match err {
            TransportError::Connect { addr: reported, .. } => assert_eq!(reported, addr),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bind_udp_ephemeral_port() {
        let socket = bind_udp("127.0.0.1:0").unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
        assert_eq!(socket.protocol(), crate::Protocol::Udp);
    }

    #[test]
    fn test_bind_udp_address_in_use() {
        let first = bind_udp("127.0.0.1:0").unwrap();
        let addr = first.local_addr().unwrap().to_string();
        let second = bind_udp(&addr);
        assert!(matches!(second, Err(TransportError::Bind { .. })));
    }
}
