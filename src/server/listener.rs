// Listener module
// Binds the blob server socket through socket2 so socket options can be set
// before listening

use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Pending-connection queue length when no connection limit is configured
pub const DEFAULT_BACKLOG: i32 = 1024;

/// Create a `TcpListener` with `SO_REUSEADDR` and, on Unix, `SO_REUSEPORT`.
///
/// `SO_REUSEPORT` lets several server processes share one port so a new
/// process can start accepting before the old one exits.
pub fn create_reusable_listener(addr: SocketAddr, backlog: i32) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;

    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    TcpListener::from_std(socket.into())
}

/// Backlog derived from the configured connection limit
pub fn backlog_for(max_connections: Option<u64>) -> i32 {
    max_connections
        .and_then(|max| i32::try_from(max).ok())
        .map_or(DEFAULT_BACKLOG, |max| max.clamp(16, DEFAULT_BACKLOG))
}
