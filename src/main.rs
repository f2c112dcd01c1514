//! multi-listener
//!
//! Serves a small HTTP endpoint on every configured address through a
//! single [`MultiListener`].
//!
//! ```text
//!   127.0.0.1:8080 ──┐
//!   [::1]:8080     ──┼──▶ MultiListener::accept ──▶ axum::serve ──▶ Router
//!   10.0.0.5:8080  ──┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, routing::get, Router};
use clap::Parser;

use multi_listener::config::{load_config, AppConfig};
use multi_listener::lifecycle::shutdown_signal;
use multi_listener::observability::{logging, metrics};
use multi_listener::MultiListener;

#[derive(Parser)]
#[command(name = "multi-listener")]
#[command(about = "Serve one application on several addresses at once", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on; repeat for more. Overrides the config file.
    #[arg(short, long = "listen", value_name = "ADDR")]
    listen: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if !cli.listen.is_empty() {
        config.listener.addresses = cli.listen;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("multi-listener v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener =
        MultiListener::bind_with(&config.listener.addresses, &config.listener.socket).await?;
    let addrs: Arc<Vec<String>> = Arc::new(
        listener
            .local_addrs()
            .iter()
            .map(ToString::to_string)
            .collect(),
    );

    let app = Router::new()
        .route("/", get(list_addresses))
        .with_state(addrs);

    // Dropping the listener when serving ends closes every address.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn list_addresses(State(addrs): State<Arc<Vec<String>>>) -> String {
    let mut body = addrs.join("\n");
    body.push('\n');
    body
}
