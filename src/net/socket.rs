//! Low-level listening socket setup.
//!
//! # Responsibilities
//! - Resolve address strings (`"localhost:0"`, `"[::1]:8080"`)
//! - Create the socket with reuse options before bind
//! - Hand back a Tokio `TcpListener` ready to accept
//!
//! # Design Decisions
//! - `SO_REUSEADDR` and `SO_REUSEPORT` are on by default so several
//!   sub-listeners (or processes) can share one address/port tuple
//! - Resolution takes the first address returned by the resolver

use std::io;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use crate::net::ListenerError;

/// Options applied to every listening socket before it is bound.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SocketOptions {
    /// Set `SO_REUSEADDR`.
    pub reuse_address: bool,

    /// Set `SO_REUSEPORT` (Unix only, ignored elsewhere).
    pub reuse_port: bool,

    /// Listen backlog.
    pub backlog: u32,

    /// Set `TCP_NODELAY` on accepted connections.
    pub nodelay: bool,

    /// Force `IPV6_V6ONLY` on IPv6 sockets. `None` keeps the OS default.
    pub only_v6: Option<bool>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            reuse_address: true,
            reuse_port: true,
            backlog: 1024,
            nodelay: false,
            only_v6: None,
        }
    }
}

/// Resolve `addr` to the first socket address it names.
pub async fn resolve(addr: &str) -> Result<SocketAddr, ListenerError> {
    let mut resolved = tokio::net::lookup_host(addr)
        .await
        .map_err(|source| ListenerError::Resolve {
            addr: addr.to_string(),
            source,
        })?;

    resolved.next().ok_or_else(|| ListenerError::Resolve {
        addr: addr.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "no addresses resolved"),
    })
}

/// Create a listening socket on `addr` with `options` applied.
///
/// Must be called from within a Tokio runtime.
pub fn bind_socket(addr: SocketAddr, options: &SocketOptions) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;

    if options.reuse_address {
        socket.set_reuse_address(true)?;
    }

    #[cfg(unix)]
    if options.reuse_port {
        socket.set_reuse_port(true)?;
    }

    if let (true, Some(only_v6)) = (addr.is_ipv6(), options.only_v6) {
        socket.set_only_v6(only_v6)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(options.backlog.min(i32::MAX as u32) as i32)?;

    TcpListener::from_std(socket.into())
}
