use netcomm_transport::{bind_udp, TcpTransport};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::Result;
use crate::listener::Listener;

/// Open a TCP connection to `host:port`.
pub fn connect(addr: &str) -> Result<Connection> {
    connect_with_config(addr, ConnectionConfig::default())
}

/// Open a TCP connection with explicit configuration.
pub fn connect_with_config(addr: &str, config: ConnectionConfig) -> Result<Connection> {
    let socket = TcpTransport::connect(addr)?;
    Connection::with_config(socket, config)
}

/// Listen for TCP connections on `host:port`.
pub fn listen(addr: &str) -> Result<Listener> {
    Listener::bind(addr)
}

/// Bind a UDP socket on `host:port` as a datagram connection.
pub fn bind(addr: &str) -> Result<Connection> {
    bind_with_config(addr, ConnectionConfig::default())
}

/// Bind a UDP socket with explicit configuration.
pub fn bind_with_config(addr: &str, config: ConnectionConfig) -> Result<Connection> {
    let socket = bind_udp(addr)?;
    Connection::with_config(socket, config)
}
