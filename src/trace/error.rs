//! Trace layer construction errors.
//!
//! Only configuration can fail; per-request problems are absorbed by the
//! layer (malformed headers) or logged (report failures).

use crate::google::GoogleError;

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// No reporter override and no project to report to.
    #[error("no project id configured for trace reporting (set google.project_id or GOOGLE_CLOUD_PROJECT)")]
    MissingProjectId,

    /// An exclusion pattern failed to compile.
    #[error("invalid path exclusion pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The Cloud Trace client could not be created.
    #[error("trace reporter setup failed: {0}")]
    Reporter(#[from] GoogleError),
}

/// Result type for trace layer setup.
pub type TraceResult<T> = Result<T, TraceError>;
