//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! net layer produces:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (per-address counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Errors are returned to the caller; logs only describe state changes
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;
