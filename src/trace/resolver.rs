//! Trace context resolution and the sampling decision.
//!
//! # Responsibilities
//! - Parse the inbound `X-Cloud-Trace-Context` header (malformed = absent)
//! - Make the sampling decision exactly once per request
//! - Clear the inbound parent span id when the workaround is enabled
//!
//! # Decision order
//! ```text
//! upstream decided?  → trust it, no sampler call
//! path excluded?     → not sampled
//! sampler set?       → sampler.check()
//! otherwise          → default_sampler.check()
//! ```

use std::sync::Arc;

use http::HeaderMap;
use tracing::debug;

use super::context::{Sampled, TraceContext, TRACE_CONTEXT_HEADER};
use super::exclusion::PathExclusions;
use super::sampler::{RateSampler, Sampler};

/// Resolves one `TraceContext` per inbound request.
#[derive(Clone)]
pub struct TraceContextResolver {
    exclusions: PathExclusions,
    capture_stack: bool,
    sampler: Option<Arc<dyn Sampler>>,
    default_sampler: Arc<dyn Sampler>,
    discard_parent_span_id: bool,
}

impl TraceContextResolver {
    /// A resolver with no exclusions, the 0.1 qps default sampler and the
    /// parent-span workaround enabled.
    pub fn new() -> Self {
        Self {
            exclusions: PathExclusions::default(),
            capture_stack: false,
            sampler: None,
            default_sampler: Arc::new(RateSampler::new(0.1)),
            discard_parent_span_id: true,
        }
    }

    pub fn with_exclusions(mut self, exclusions: PathExclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_capture_stack(mut self, capture_stack: bool) -> Self {
        self.capture_stack = capture_stack;
        self
    }

    /// Override sampler; takes precedence over the default sampler.
    pub fn with_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn with_default_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.default_sampler = sampler;
        self
    }

    pub fn with_discard_parent_span_id(mut self, discard: bool) -> Self {
        self.discard_parent_span_id = discard;
        self
    }

    /// Parse the inbound trace context; a fresh one when absent or malformed.
    pub fn parse(&self, headers: &HeaderMap) -> TraceContext {
        let Some(raw) = headers.get(TRACE_CONTEXT_HEADER) else {
            return TraceContext::new();
        };

        match raw.to_str().ok().and_then(TraceContext::parse_header) {
            Some(ctx) => ctx,
            None => {
                debug!(header = ?raw, "Ignoring malformed trace context header");
                TraceContext::new()
            }
        }
    }

    /// Resolve the context for a request: parse, decide, clear parent span.
    pub fn resolve(&self, headers: &HeaderMap, path: &str) -> TraceContext {
        let parsed = self.parse(headers);
        let sampled = match parsed.sampled() {
            Sampled::Unknown => Sampled::from(self.decide(path)),
            upstream => upstream,
        };

        let resolved = parsed.with_sampling(sampled, self.capture_stack);
        if self.discard_parent_span_id {
            resolved.with_span_id(None)
        } else {
            resolved
        }
    }

    fn decide(&self, path: &str) -> bool {
        if self.exclusions.is_excluded(path) {
            return false;
        }
        match &self.sampler {
            Some(sampler) => sampler.check(),
            None => self.default_sampler.check(),
        }
    }
}

impl Default for TraceContextResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TraceContextResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceContextResolver")
            .field("exclusions", &self.exclusions.len())
            .field("capture_stack", &self.capture_stack)
            .field("sampler", &self.sampler.as_ref().map(|s| s.description()))
            .field("default_sampler", &self.default_sampler.description())
            .field("discard_parent_span_id", &self.discard_parent_span_id)
            .finish()
    }
}

/// Normalize a request path: always starts with `/`.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
