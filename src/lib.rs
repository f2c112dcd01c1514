//! TCP listener bound to many addresses, accepted through one stream.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::AppConfig;
pub use lifecycle::Shutdown;
pub use net::{ListenerError, MultiListener, SocketOptions};
