//! Observability subsystem.
//!
//! Every subsystem logs through `tracing` macros with structured fields;
//! `logging.rs` installs the subscriber that formats and filters them.
//! Request-level distributed tracing lives in `crate::trace`.

pub mod logging;

pub use logging::init_logging;
