//! Thin Google Cloud clients and Cloud Trace request middleware.
//!
//! - [`trace`]: `X-Cloud-Trace-Context` propagation, sampling and reporting
//!   as a `tower::Layer`
//! - [`speech`]: Speech-to-Text recognition
//! - [`pubsub`]: Pub/Sub topic and subscription management

pub mod config;
pub mod google;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pubsub;
pub mod speech;
pub mod trace;

pub use config::AppConfig;
pub use google::GoogleError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use trace::{TraceHandle, TraceLayer};
