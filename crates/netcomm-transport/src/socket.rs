use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, UdpSocket};

use crate::error::{Result, TransportError};

/// Which transport a [`NetSocket`] runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Connected TCP byte stream.
    Tcp,
    /// Bound UDP datagram socket.
    Udp,
}

impl Protocol {
    /// Short uppercase name, as printed in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A connected TCP stream or a bound UDP socket.
///
/// This is the fundamental I/O type returned by transport operations. All
/// methods take `&self`, so one clone can block in [`NetSocket::recv`] while
/// another sends.
pub struct NetSocket {
    inner: NetSocketInner,
    peer: Option<SocketAddr>,
}

enum NetSocketInner {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl From<TcpStream> for NetSocket {
    fn from(stream: TcpStream) -> Self {
        let peer = stream.peer_addr().ok();
        Self {
            inner: NetSocketInner::Tcp(stream),
            peer,
        }
    }
}

impl From<UdpSocket> for NetSocket {
    fn from(socket: UdpSocket) -> Self {
        let peer = socket.peer_addr().ok();
        Self {
            inner: NetSocketInner::Udp(socket),
            peer,
        }
    }
}

impl NetSocket {
    /// Transport kind of this socket.
    pub fn protocol(&self) -> Protocol {
        match &self.inner {
            NetSocketInner::Tcp(_) => Protocol::Tcp,
            NetSocketInner::Udp(_) => Protocol::Udp,
        }
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => stream.local_addr().map_err(Into::into),
            NetSocketInner::Udp(socket) => socket.local_addr().map_err(Into::into),
        }
    }

    /// Remote address of a connected socket.
    ///
    /// Always present for TCP streams; `None` for an unconnected UDP socket.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Receive bytes into `buf` (blocking).
    ///
    /// Returns the byte count and the sender address. A count of zero means
    /// the stream reached EOF (TCP) or an empty datagram arrived (UDP).
    pub fn recv(&self, buf: &mut [u8]) -> std::io::Result<(usize, Option<SocketAddr>)> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => {
                let mut reader: &TcpStream = stream;
                let n = reader.read(buf)?;
                Ok((n, self.peer))
            }
            NetSocketInner::Udp(socket) => {
                let (n, from) = socket.recv_from(buf)?;
                Ok((n, Some(from)))
            }
        }
    }

    /// Send a complete buffer (blocking).
    ///
    /// TCP writes the whole buffer and ignores `dest`. UDP sends one datagram
    /// to `dest`, falling back to the connected peer.
    pub fn send(&self, data: &[u8], dest: Option<SocketAddr>) -> Result<()> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => {
                let mut writer: &TcpStream = stream;
                let mut offset = 0usize;
                while offset < data.len() {
                    match writer.write(&data[offset..]) {
                        Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero).into()),
                        Ok(n) => offset += n,
                        Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                        Err(err) => return Err(err.into()),
                    }
                }
                writer.flush().map_err(Into::into)
            }
            NetSocketInner::Udp(socket) => {
                let target = dest.or(self.peer).ok_or(TransportError::MissingDestination)?;
                let sent = loop {
                    match socket.send_to(data, target) {
                        Ok(n) => break n,
                        Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                        Err(err) => return Err(err.into()),
                    }
                };
                if sent != data.len() {
                    return Err(std::io::Error::new(
                        ErrorKind::WriteZero,
                        format!("datagram truncated ({sent} of {} bytes)", data.len()),
                    )
                    .into());
                }
                Ok(())
            }
        }
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            NetSocketInner::Udp(socket) => socket.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying socket.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            NetSocketInner::Udp(socket) => socket.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this socket (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            NetSocketInner::Tcp(stream) => NetSocketInner::Tcp(stream.try_clone()?),
            NetSocketInner::Udp(socket) => NetSocketInner::Udp(socket.try_clone()?),
        };
        Ok(Self {
            inner,
            peer: self.peer,
        })
    }

    /// Shut down both halves of a TCP stream, unblocking readers on every clone.
    ///
    /// UDP sockets have no shutdown; this is a no-op for them.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            NetSocketInner::Tcp(stream) => match stream.shutdown(Shutdown::Both) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
                Err(err) => Err(err.into()),
            },
            NetSocketInner::Udp(_) => Ok(()),
        }
    }
}

impl fmt::Debug for NetSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetSocket")
            .field("protocol", &self.protocol())
            .field("local", &self.local_addr().ok())
            .field("peer", &self.peer)
            .finish()
    }
}
