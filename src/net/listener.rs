//! TCP listener spanning several addresses.
//!
//! # Responsibilities
//! - Bind every requested address, or none of them
//! - Run one accept task per sub-listener
//! - Merge accepted connections into a single `accept()` in arrival order
//! - Exactly-once close that never leaks an accepted connection
//!
//! # Design Decisions
//! - The merge point is a capacity-1 channel; producers reserve a slot
//!   while racing shutdown, so nothing is committed once shutdown fires
//! - A sub-listener whose accept fails reports the error once and stops;
//!   the remaining addresses keep serving
//! - `accept()` checks shutdown before the merge point, so nothing is
//!   delivered after close
//! - `close()` never waits on the merge point or on a parked consumer

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::Stream;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};

use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::binder::{closed_error, Binder, BinderHandle};
use crate::net::socket::SocketOptions;
use crate::net::ListenerError;
use crate::observability::metrics;

/// Result of a single accept: the stream and the peer address.
pub type AcceptResult = Result<(TcpStream, SocketAddr), ListenerError>;

/// A TCP listener bound to several addresses at once.
#[derive(Debug)]
pub struct MultiListener {
    listeners: Vec<BinderHandle>,
    conns: Mutex<mpsc::Receiver<AcceptResult>>,
    shutdown: Shutdown,
    closed: AtomicBool,
}

impl MultiListener {
    /// Listen on every address in `addrs` with default [`SocketOptions`].
    pub async fn bind<I, S>(addrs: I) -> Result<Self, ListenerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::bind_with(addrs, &SocketOptions::default()).await
    }

    /// Listen on every address in `addrs`.
    ///
    /// Addresses are bound in order. If any of them fails, the ones already
    /// bound are closed before the error is returned.
    pub async fn bind_with<I, S>(addrs: I, options: &SocketOptions) -> Result<Self, ListenerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addrs: Vec<S> = addrs.into_iter().collect();
        if addrs.is_empty() {
            return Err(ListenerError::NoAddresses);
        }

        let mut binders = Vec::with_capacity(addrs.len());
        let mut listeners = Vec::with_capacity(addrs.len());
        for addr in &addrs {
            match Binder::bind(addr.as_ref(), options).await {
                Ok((binder, handle)) => {
                    binders.push(binder);
                    listeners.push(handle);
                }
                Err(err) => {
                    drop(binders);
                    let mut cleanup = Vec::new();
                    for handle in &listeners {
                        if let Err(cerr) = handle.close().await {
                            cleanup.push(cerr);
                        }
                    }
                    return Err(ListenerError::join(err, cleanup));
                }
            }
        }

        let (tx, rx) = mpsc::channel(1);
        let shutdown = Shutdown::new();
        for (binder, handle) in binders.into_iter().zip(&listeners) {
            let task = tokio::spawn(accept_loop(binder, tx.clone(), shutdown.subscribe()));
            handle.attach(task);
        }

        let bound: Vec<SocketAddr> = listeners.iter().map(BinderHandle::local_addr).collect();
        tracing::info!(addresses = ?bound, "Listening for connections");

        Ok(Self {
            listeners,
            conns: Mutex::new(rx),
            shutdown,
            closed: AtomicBool::new(false),
        })
    }

    /// Wait for a connection on any address.
    ///
    /// An [`ListenerError::Accept`] means one sub-listener is out of service;
    /// it is reported once and the others keep serving. After
    /// [`close`](Self::close) every call returns [`ListenerError::Closed`].
    pub async fn accept(&self) -> AcceptResult {
        let mut shutdown = self.shutdown.subscribe();
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                self.discard_undelivered();
                Err(ListenerError::Closed)
            }
            next = self.next_conn() => next,
        }
    }

    async fn next_conn(&self) -> AcceptResult {
        let mut conns = self.conns.lock().await;
        match conns.recv().await {
            Some(result) => result,
            None => {
                // Every sub-listener is gone; nothing left but close.
                drop(conns);
                std::future::pending().await
            }
        }
    }

    /// Stream of accepted connections, ending once the listener is closed.
    pub fn incoming(&self) -> impl Stream<Item = AcceptResult> + '_ {
        futures_util::stream::unfold(self, |listener| async move {
            match listener.accept().await {
                Err(ListenerError::Closed) => None,
                result => Some((result, listener)),
            }
        })
    }

    /// Close every sub-listener.
    ///
    /// Only the first call does any work; later calls return
    /// [`ListenerError::Closed`]. All sub-listeners are closed even if one
    /// fails, and the first failure is returned.
    pub async fn close(&self) -> Result<(), ListenerError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ListenerError::Closed);
        }

        tracing::debug!(listeners = self.listeners.len(), "Closing listener");
        self.shutdown.trigger();

        let mut first_err = None;
        for handle in &self.listeners {
            match handle.close().await {
                // Already taken out of service on its own.
                Ok(()) | Err(ListenerError::Closed) => {}
                Err(err) => {
                    first_err.get_or_insert(err);
                }
            }
        }

        self.discard_undelivered();

        tracing::debug!("Listener closed");
        first_err.map_or(Ok(()), Err)
    }

    /// Close anything committed to the merge point but never delivered.
    ///
    /// Never waits: if a parked `accept()` holds the receiver, that call
    /// drains it once it observes shutdown, and dropping the listener
    /// drains whatever is left.
    fn discard_undelivered(&self) {
        let Ok(mut conns) = self.conns.try_lock() else {
            return;
        };
        conns.close();
        while let Ok(result) = conns.try_recv() {
            if let Ok((stream, peer)) = result {
                if let Ok(local) = stream.local_addr() {
                    metrics::record_discarded(local);
                }
                tracing::trace!(peer_addr = %peer, "Dropping undelivered connection");
            }
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Address of the first sub-listener.
    pub fn local_addr(&self) -> SocketAddr {
        self.listeners[0].local_addr()
    }

    /// Addresses of every sub-listener, in the order they were requested.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners.iter().map(BinderHandle::local_addr).collect()
    }

    /// The sub-listeners, in the order they were requested.
    pub fn listeners(&self) -> &[BinderHandle] {
        &self.listeners
    }
}

/// Drive one sub-listener until it fails or shutdown fires.
async fn accept_loop(
    mut binder: Binder,
    conns: mpsc::Sender<AcceptResult>,
    mut shutdown: ShutdownSignal,
) {
    let addr = binder.local_addr();

    let source = loop {
        let conn = match binder.accept_one().await {
            Ok(conn) => conn,
            Err(source) => break source,
        };

        // The slot may stay full for a while; a close must not wait on it.
        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                metrics::record_discarded(addr);
                tracing::trace!(address = %addr, "Connection closed during shutdown");
                return;
            }
            _ = binder.closed() => {
                metrics::record_discarded(addr);
                tracing::trace!(address = %addr, "Connection closed with its sub-listener");
                break closed_error();
            }
            permit = conns.reserve() => match permit {
                Ok(permit) => {
                    permit.send(Ok(conn));
                    metrics::record_accepted(addr);
                }
                Err(_) => return,
            },
        }
    };

    // Release the socket before reporting, so closing never waits on the consumer.
    drop(binder);

    metrics::record_accept_error(addr);
    tracing::debug!(address = %addr, error = %source, "Sub-listener stopped");
    report_failure(&conns, &mut shutdown, ListenerError::Accept { addr, source }).await;
}

/// Send the final error of a sub-listener unless shutdown fires first.
async fn report_failure(
    conns: &mpsc::Sender<AcceptResult>,
    shutdown: &mut ShutdownSignal,
    err: ListenerError,
) {
    tokio::select! {
        biased;
        _ = shutdown.recv() => {}
        permit = conns.reserve() => {
            if let Ok(permit) = permit {
                permit.send(Err(err));
            }
        }
    }
}
