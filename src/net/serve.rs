//! Serving axum applications over a [`MultiListener`].

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::net::{ListenerError, MultiListener};

impl axum::serve::Listener for MultiListener {
    type Io = TcpStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match MultiListener::accept(self).await {
                Ok(conn) => return conn,
                // Serving stops through graceful shutdown, not through accept.
                Err(ListenerError::Closed) => std::future::pending::<()>().await,
                Err(error) => {
                    tracing::warn!(%error, "Sub-listener out of service, continuing on the rest");
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(MultiListener::local_addr(self))
    }
}
