//! HTTP serving.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum, tower-http logging and timeout)
//!     → crate::trace::TraceLayer (context, sampling, root span)
//!     → handlers.rs
//! ```

pub mod handlers;
pub mod server;

pub use server::HttpServer;
