//! Metrics collection and exposition.
//!
//! # Metrics
//! - `listener_connections_accepted_total` (counter): connections handed to the consumer, by address
//! - `listener_accept_errors_total` (counter): sub-listeners taken out of service, by address
//! - `listener_connections_discarded_total` (counter): connections closed during shutdown, by address
//!
//! Recording is a no-op until a recorder is installed, e.g. with [`init_metrics`].

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter, serving scrapes on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_accepted(addr: SocketAddr) {
    metrics::counter!("listener_connections_accepted_total", "address" => addr.to_string())
        .increment(1);
}

pub fn record_accept_error(addr: SocketAddr) {
    metrics::counter!("listener_accept_errors_total", "address" => addr.to_string()).increment(1);
}

pub fn record_discarded(addr: SocketAddr) {
    metrics::counter!("listener_connections_discarded_total", "address" => addr.to_string())
        .increment(1);
}
