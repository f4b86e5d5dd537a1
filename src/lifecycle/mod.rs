//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! Ctrl+C
//!     → Shutdown::trigger (shutdown.rs)
//!     → server stops accepting, drains in-flight requests
//!     → background trace reports still running finish on the runtime
//! ```

pub mod shutdown;

pub use shutdown::{trigger_on_ctrl_c, Shutdown};
