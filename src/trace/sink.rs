//! Error sink for trace reporting failures.

use std::sync::Arc;

/// Receives messages about failed trace reports.
pub trait ErrorSink: Send + Sync {
    fn error(&self, message: &str);
}

/// Forwards to `tracing::error!`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn error(&self, message: &str) {
        tracing::error!(target: "gcloud_lite::trace", "{message}");
    }
}

/// Deliver `message` to `sink`, or warn through `tracing` when none is set.
pub(crate) fn report_failure(sink: Option<&Arc<dyn ErrorSink>>, message: &str) {
    match sink {
        Some(sink) => sink.error(message),
        None => tracing::warn!("{message}"),
    }
}
