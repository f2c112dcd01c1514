//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every ShutdownSignal wakes → accept tasks stop handing off
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → shutdown_signal() resolves → embedder closes listener
//! ```
//!
//! # Design Decisions
//! - Shutdown fires once and stays fired; late subscribers still see it
//! - Dropping the coordinator counts as shutdown for its subscribers

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::shutdown_signal;
