//! Error type shared by the network layer.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::task::JoinError;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Construction was attempted with an empty address set.
    #[error("no addresses to listen on")]
    NoAddresses,

    /// An address string could not be resolved to a socket address.
    #[error("failed to resolve {addr:?}: {source}")]
    Resolve { addr: String, source: io::Error },

    /// Socket creation, option setup, bind or listen failed.
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    /// A sub-listener failed to accept. That sub-listener is out of service.
    #[error("failed to accept on {addr}: {source}")]
    Accept { addr: SocketAddr, source: io::Error },

    /// The listener (or sub-listener) has already been closed.
    #[error("use of closed network listener")]
    Closed,

    /// The accept task of a sub-listener panicked.
    #[error("accept task for {addr} failed: {source}")]
    Task { addr: SocketAddr, source: JoinError },

    /// A failure together with the errors hit while cleaning up after it.
    #[error("{first} (plus {} error(s) during cleanup)", .rest.len())]
    Aggregate {
        first: Box<ListenerError>,
        rest: Vec<ListenerError>,
    },
}

impl ListenerError {
    /// Returns true for the closed sentinel.
    pub fn is_closed(&self) -> bool {
        matches!(self, ListenerError::Closed)
    }

    /// Join `first` with any cleanup errors. Returns `first` unchanged when
    /// there is nothing to join.
    pub fn join(first: ListenerError, rest: Vec<ListenerError>) -> Self {
        if rest.is_empty() {
            first
        } else {
            ListenerError::Aggregate {
                first: Box::new(first),
                rest,
            }
        }
    }

    /// Iterate over every contributing error, flattening aggregates.
    pub fn errors(&self) -> Box<dyn Iterator<Item = &ListenerError> + '_> {
        match self {
            ListenerError::Aggregate { first, rest } => {
                Box::new(first.errors().chain(rest.iter().flat_map(|e| e.errors())))
            }
            other => Box::new(std::iter::once(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_without_cleanup_errors_is_identity() {
        let err = ListenerError::join(ListenerError::NoAddresses, Vec::new());
        assert!(matches!(err, ListenerError::NoAddresses));
    }

    #[test]
    fn aggregate_flattens_all_errors() {
        let bind = ListenerError::Bind {
            addr: "bogus".into(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "bad"),
        };
        let err = ListenerError::join(bind, vec![ListenerError::Closed, ListenerError::Closed]);

        assert_eq!(err.errors().count(), 3);
        assert_eq!(err.errors().filter(|e| e.is_closed()).count(), 2);
        assert!(!err.is_closed());
        assert!(err.to_string().contains("2 error(s) during cleanup"));
    }
}
