//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the axum `Router` with the demo handlers
//! - Wire middleware: request timeout, Cloud Trace propagation, HTTP logging
//! - Serve on a bound listener until shutdown is signalled

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer as HttpLogLayer;

use super::handlers;
use crate::config::AppConfig;
use crate::lifecycle::Shutdown;
use crate::trace::TraceLayer;

/// HTTP server hosting the traced routes.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a server; requests are traced when `trace` is given.
    pub fn new(config: AppConfig, trace: Option<TraceLayer>) -> Self {
        let router = Self::build_router(&config, trace);
        Self { router, config }
    }

    #[allow(deprecated)]
    fn build_router(config: &AppConfig, trace: Option<TraceLayer>) -> Router {
        let router = Router::new()
            .route("/", get(handlers::index))
            .route("/_ah/health", get(handlers::health))
            .route("/work", get(handlers::work))
            .route("/fail", get(handlers::fail));

        // Trace sits inside the timeout so timed-out requests still close their span.
        let router = match trace {
            Some(layer) => router.layer(layer),
            None => router,
        };

        router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(HttpLogLayer::new_for_http())
    }

    /// The router, for serving elsewhere or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(Shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
