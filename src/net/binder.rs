//! A single bound sub-listener.
//!
//! A sub-listener is split in two halves:
//! - [`Binder`] owns the socket and is moved into the accept task
//! - [`BinderHandle`] stays with the owner and can close the socket
//!
//! The socket is released when the `Binder` is dropped. Closing the handle
//! makes a pending [`Binder::accept_one`] return an error right away and
//! then waits for that release.

use std::io;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::socket::{bind_socket, resolve, SocketOptions};
use crate::net::ListenerError;

/// Accepting half of a sub-listener.
#[derive(Debug)]
pub struct Binder {
    inner: TcpListener,
    local_addr: SocketAddr,
    nodelay: bool,
    closed: ShutdownSignal,
    /// Dropped together with the socket; wakes [`BinderHandle::close`].
    _released: oneshot::Sender<()>,
}

impl Binder {
    /// Resolve and bind `addr`, returning both halves.
    pub async fn bind(
        addr: &str,
        options: &SocketOptions,
    ) -> Result<(Binder, BinderHandle), ListenerError> {
        let socket_addr = resolve(addr).await?;
        let bind_err = |source: io::Error| ListenerError::Bind {
            addr: addr.to_string(),
            source,
        };

        let inner = bind_socket(socket_addr, options).map_err(bind_err)?;
        let local_addr = inner.local_addr().map_err(bind_err)?;

        tracing::debug!(address = %local_addr, requested = addr, "Sub-listener bound");

        let close = Shutdown::new();
        let (released_tx, released_rx) = oneshot::channel();
        let binder = Binder {
            inner,
            local_addr,
            nodelay: options.nodelay,
            closed: close.subscribe(),
            _released: released_tx,
        };
        let handle = BinderHandle {
            local_addr,
            close,
            released: Mutex::new(Some(released_rx)),
            task: Mutex::new(None),
        };
        Ok((binder, handle))
    }

    /// Accept one connection.
    ///
    /// Fails with [`io::ErrorKind::NotConnected`] once the handle is closed,
    /// even if connections are still queued.
    pub async fn accept_one(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        tokio::select! {
            biased;
            _ = self.closed.recv() => Err(closed_error()),
            accepted = self.inner.accept() => {
                let (stream, peer) = accepted?;
                if self.nodelay {
                    if let Err(error) = stream.set_nodelay(true) {
                        tracing::debug!(peer_addr = %peer, %error, "Failed to set TCP_NODELAY");
                    }
                }
                Ok((stream, peer))
            }
        }
    }

    /// Resolve once the handle has been closed (or dropped). Cancel safe.
    pub async fn closed(&mut self) {
        self.closed.recv().await
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Error reported by a sub-listener whose handle was closed.
pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "use of closed network listener")
}

/// Controlling half of a sub-listener.
#[derive(Debug)]
pub struct BinderHandle {
    local_addr: SocketAddr,
    close: Shutdown,
    released: Mutex<Option<oneshot::Receiver<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BinderHandle {
    /// Address the socket is bound to. Still available after close.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.close.is_triggered()
    }

    /// Record the task driving the paired [`Binder`].
    pub(crate) fn attach(&self, task: JoinHandle<()>) {
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    /// Close the socket.
    ///
    /// Returns once the socket has been released. The paired `Binder` must
    /// be owned by a running task or already dropped. Returns
    /// [`ListenerError::Closed`] on every call after the first, and
    /// [`ListenerError::Task`] if the accept task panicked.
    pub async fn close(&self) -> Result<(), ListenerError> {
        if !self.close.trigger() {
            return Err(ListenerError::Closed);
        }

        let released = self
            .released
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(released) = released {
            // Resolves with an error when the sender is dropped, which is the point.
            let _ = released.await;
        }

        let finished = {
            let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
            match task.as_ref() {
                Some(handle) if handle.is_finished() => task.take(),
                _ => None,
            }
        };
        if let Some(handle) = finished {
            handle.await.map_err(|source| ListenerError::Task {
                addr: self.local_addr,
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn accepts_connections() {
        let (mut binder, handle) = Binder::bind("127.0.0.1:0", &SocketOptions::default())
            .await
            .unwrap();
        let addr = handle.local_addr();

        let client = TcpStream::connect(addr).await.unwrap();
        let (stream, peer) = binder.accept_one().await.unwrap();

        assert_eq!(stream.local_addr().unwrap(), addr);
        assert_eq!(peer, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn close_interrupts_pending_accept() {
        let (mut binder, handle) = Binder::bind("127.0.0.1:0", &SocketOptions::default())
            .await
            .unwrap();
        let addr = handle.local_addr();

        let task = tokio::spawn(async move {
            let err = binder.accept_one().await.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        });
        handle.attach(task);

        tokio::time::timeout(Duration::from_secs(1), handle.close())
            .await
            .expect("close should not hang")
            .unwrap();
        assert!(handle.is_closed());
        assert_eq!(handle.local_addr(), addr);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn second_close_reports_closed() {
        let (binder, handle) = Binder::bind("127.0.0.1:0", &SocketOptions::default())
            .await
            .unwrap();
        drop(binder);

        handle.close().await.unwrap();
        assert!(handle.close().await.unwrap_err().is_closed());
    }

    #[tokio::test]
    async fn panicked_task_surfaces_on_close() {
        let (binder, handle) = Binder::bind("127.0.0.1:0", &SocketOptions::default())
            .await
            .unwrap();

        let task = tokio::spawn(async move {
            let _binder = binder;
            panic!("accept task blew up");
        });
        while !task.is_finished() {
            tokio::task::yield_now().await;
        }
        handle.attach(task);

        let err = handle.close().await.unwrap_err();
        assert!(matches!(err, ListenerError::Task { .. }));
    }
}
