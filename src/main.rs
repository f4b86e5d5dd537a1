//! gcloud-lite server.
//!
//! Serves a handful of demo routes behind the Cloud Trace layer:
//!
//! ```text
//! Ctrl+C ─▶ lifecycle::Shutdown
//!                │
//! request ─▶ tower-http (log, timeout) ─▶ trace::TraceLayer ─▶ handlers
//!                                              │
//!                                              └─▶ Cloud Trace (sampled only)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gcloud_lite::config::{load_config, parse_config};
use gcloud_lite::lifecycle::{trigger_on_ctrl_c, Shutdown};
use gcloud_lite::observability::init_logging;
use gcloud_lite::{HttpServer, TraceLayer};

#[derive(Parser)]
#[command(name = "gcloud-lite")]
#[command(about = "HTTP server with Cloud Trace context propagation", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => parse_config("")?,
    };
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "gcloud-lite starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        trace_enabled = config.trace.enabled,
        project_id = ?config.google.project_id,
        "Configuration loaded"
    );

    let trace = if config.trace.enabled {
        Some(TraceLayer::from_config(&config)?)
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    trigger_on_ctrl_c(shutdown.clone());

    HttpServer::new(config, trace)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
