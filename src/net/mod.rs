//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Address strings
//!     → socket.rs (resolve, SO_REUSEADDR/SO_REUSEPORT, bind, listen)
//!     → binder.rs (one sub-listener per address, closable from outside)
//!     → listener.rs (one accept task per sub-listener, merged accept())
//!     → serve.rs (optional: hand the merged stream to axum)
//!
//! Sub-listener states:
//!     Bound → Accepting → (accept error | closed) → Released
//! ```
//!
//! # Design Decisions
//! - All addresses bind or none do
//! - Arrival order across addresses, no priority between them
//! - A failed sub-listener is dropped from service, never retried

pub mod binder;
pub mod error;
pub mod listener;
pub mod serve;
pub mod socket;

pub use binder::{Binder, BinderHandle};
pub use error::ListenerError;
pub use listener::{AcceptResult, MultiListener};
pub use socket::SocketOptions;
