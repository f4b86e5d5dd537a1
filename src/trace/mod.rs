//! Request tracing with Cloud Trace context propagation.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → resolver.rs (parse X-Cloud-Trace-Context, exclusions, sampler)
//!     → record.rs (root span, TraceHandle in extensions)
//!     → wrapped handler
//!     → middleware.rs (close spans, status label, response header)
//!     → reporter.rs (PATCH traces, sampled only)
//!     → sink.rs (report failures)
//! ```
//!
//! # Design Decisions
//! - Exactly one sampling decision per request; upstream decisions win
//! - Per-request state is never shared across requests
//! - Samplers, exclusions and reporter are built once at startup

pub mod context;
pub mod error;
pub mod exclusion;
pub mod middleware;
pub mod record;
pub mod reporter;
pub mod resolver;
pub mod sampler;
pub mod sink;
pub mod span;
pub mod stack;

pub use context::{Sampled, SpanId, TraceContext, TraceId, TRACE_CONTEXT_HEADER};
pub use error::{TraceError, TraceResult};
pub use exclusion::{PathExclusion, PathExclusions};
pub use middleware::{TraceLayer, TraceLayerBuilder, TraceService};
pub use record::{SpanGuard, TraceHandle, TraceRecord};
pub use reporter::{CloudTraceReporter, TraceReporter, Traces};
pub use resolver::TraceContextResolver;
pub use sampler::{
    sampler_from_config, AlwaysSampler, NeverSampler, ProbabilitySampler, RateSampler, Sampler,
};
pub use sink::{ErrorSink, TracingSink};
pub use span::{labels, Span, SpanKind};
