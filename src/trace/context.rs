//! Trace context value and the `X-Cloud-Trace-Context` header codec.
//!
//! Header format: `TRACE_ID[/SPAN_ID][;o=OPTIONS]`
//!
//! - `TRACE_ID`: word characters (`[A-Za-z0-9_]+`); generated ids are 32 hex
//! - `SPAN_ID`: decimal u64
//! - `OPTIONS`: bit 0 = sampled, bit 1 = capture stack; absent = undecided

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Header carrying the trace context in both directions.
pub const TRACE_CONTEXT_HEADER: &str = "x-cloud-trace-context";

const OPTION_SAMPLED: u32 = 0x01;
const OPTION_CAPTURE_STACK: u32 = 0x02;

/// Opaque trace identifier. Inbound ids are kept as given; generated ids
/// are 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(String);

impl TraceId {
    /// Generate a random trace id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parse a trace id: any non-empty run of ASCII word characters.
    pub fn parse(s: &str) -> Option<Self> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            Some(Self(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 64-bit span identifier, rendered in decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpanId(u64);

impl SpanId {
    /// Generate a random non-zero span id.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self(rng.gen_range(1..=u64::MAX))
    }

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tri-state sampling flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sampled {
    /// No decision yet.
    #[default]
    Unknown,
    Yes,
    No,
}

impl Sampled {
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    pub fn is_sampled(&self) -> bool {
        matches!(self, Self::Yes)
    }
}

impl From<bool> for Sampled {
    fn from(sampled: bool) -> Self {
        if sampled {
            Self::Yes
        } else {
            Self::No
        }
    }
}

/// Immutable trace context for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    trace_id: TraceId,
    span_id: Option<SpanId>,
    sampled: Sampled,
    capture_stack: bool,
}

impl TraceContext {
    /// A fresh context: new trace id, no parent span, undecided.
    pub fn new() -> Self {
        Self {
            trace_id: TraceId::generate(),
            span_id: None,
            sampled: Sampled::Unknown,
            capture_stack: false,
        }
    }

    pub fn with_trace_id(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            ..Self::new()
        }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.trace_id
    }

    pub fn span_id(&self) -> Option<SpanId> {
        self.span_id
    }

    pub fn sampled(&self) -> Sampled {
        self.sampled
    }

    pub fn capture_stack(&self) -> bool {
        self.capture_stack
    }

    /// Copy with a different span id.
    pub fn with_span_id(&self, span_id: Option<SpanId>) -> Self {
        Self {
            span_id,
            ..self.clone()
        }
    }

    /// Copy with a sampling decision; capture_stack only survives when sampled.
    pub fn with_sampling(&self, sampled: Sampled, capture_stack: bool) -> Self {
        Self {
            sampled,
            capture_stack: capture_stack && sampled.is_sampled(),
            ..self.clone()
        }
    }

    /// Parse an `X-Cloud-Trace-Context` value. Returns `None` when malformed.
    pub fn parse_header(value: &str) -> Option<Self> {
        let value = value.trim();
        let (ids, options) = match value.split_once(';') {
            Some((ids, rest)) => (ids, Some(rest.strip_prefix("o=")?)),
            None => (value, None),
        };

        let (trace_part, span_part) = match ids.split_once('/') {
            Some((trace, span)) => (trace, Some(span)),
            None => (ids, None),
        };

        let trace_id = TraceId::parse(trace_part)?;
        let span_id = match span_part {
            Some(span) => Some(SpanId(parse_decimal(span)?)),
            None => None,
        };

        let (sampled, capture_stack) = match options {
            Some(options) => {
                let bits = u32::try_from(parse_decimal(options)?).ok()?;
                let sampled = bits & OPTION_SAMPLED != 0;
                (Sampled::from(sampled), sampled && bits & OPTION_CAPTURE_STACK != 0)
            }
            None => (Sampled::Unknown, false),
        };

        Some(Self {
            trace_id,
            span_id,
            sampled,
            capture_stack,
        })
    }

    /// Serialize into the header format.
    pub fn to_header_value(&self) -> String {
        let mut out = self.trace_id.to_string();
        if let Some(span_id) = self.span_id {
            out.push('/');
            out.push_str(&span_id.to_string());
        }
        if self.sampled.is_decided() {
            let mut bits = 0;
            if self.sampled.is_sampled() {
                bits |= OPTION_SAMPLED;
            }
            if self.capture_stack {
                bits |= OPTION_CAPTURE_STACK;
            }
            out.push_str(&format!(";o={bits}"));
        }
        out
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

impl FromStr for TraceContext {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_header(s).ok_or(())
    }
}

// Digits only: rejects signs and whitespace that `u64::from_str` would
// partially accept.
fn parse_decimal(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = "105445aa7843bc8bf206b12000100000";

    #[test]
    fn test_generate_ids() {
        let trace_id = TraceId::generate();
        assert_eq!(trace_id.as_str().len(), 32);
        assert!(TraceId::parse(trace_id.as_str()).is_some());
        assert_ne!(TraceId::generate(), trace_id);

        assert_ne!(SpanId::generate().value(), 0);
    }

    #[test]
    fn test_parse_full_header() {
        let ctx = TraceContext::parse_header(&format!("{TRACE}/1;o=1")).unwrap();
        assert_eq!(ctx.trace_id().as_str(), TRACE);
        assert_eq!(ctx.span_id(), Some(SpanId::new(1)));
        assert_eq!(ctx.sampled(), Sampled::Yes);
        assert!(!ctx.capture_stack());
    }

    #[test]
    fn test_parse_trace_only() {
        let ctx = TraceContext::parse_header(TRACE).unwrap();
        assert_eq!(ctx.span_id(), None);
        assert_eq!(ctx.sampled(), Sampled::Unknown);
    }

    #[test]
    fn test_parse_options() {
        let ctx = TraceContext::parse_header(&format!("{TRACE};o=0")).unwrap();
        assert_eq!(ctx.sampled(), Sampled::No);

        let ctx = TraceContext::parse_header(&format!("{TRACE}/7;o=3")).unwrap();
        assert_eq!(ctx.sampled(), Sampled::Yes);
        assert!(ctx.capture_stack());

        // Stack bit without sampled bit is meaningless.
        let ctx = TraceContext::parse_header(&format!("{TRACE};o=2")).unwrap();
        assert_eq!(ctx.sampled(), Sampled::No);
        assert!(!ctx.capture_stack());
    }

    #[test]
    fn test_parse_trace_id_kept_as_given() {
        let upper = TRACE.to_uppercase();
        let ctx = TraceContext::parse_header(&upper).unwrap();
        assert_eq!(ctx.trace_id().as_str(), upper);

        let ctx = TraceContext::parse_header("abc;o=1").unwrap();
        assert_eq!(ctx.trace_id().as_str(), "abc");
        assert_eq!(ctx.span_id(), None);
        assert_eq!(ctx.sampled(), Sampled::Yes);
        assert_eq!(ctx.to_header_value(), "abc;o=1");

        let ctx = TraceContext::parse_header("req_42/9;o=0").unwrap();
        assert_eq!(ctx.trace_id().as_str(), "req_42");
        assert_eq!(ctx.span_id(), Some(SpanId::new(9)));
        assert_eq!(ctx.sampled(), Sampled::No);
    }

    #[test]
    fn test_malformed_headers() {
        let bad_values = vec![
            String::new(),
            "/1;o=1".to_string(),
            ";o=1".to_string(),
            "abc-def;o=1".to_string(),
            "abc.def".to_string(),
            "ab c;o=1".to_string(),
            format!("{TRACE}/"),
            format!("{TRACE}/-1"),
            format!("{TRACE}/12x"),
            format!("{TRACE};o="),
            format!("{TRACE};x=1"),
            format!("{TRACE};o=1;o=1"),
            format!("{TRACE}/1/2"),
        ];
        for bad in &bad_values {
            assert!(TraceContext::parse_header(bad).is_none(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_serialize() {
        let ctx = TraceContext::with_trace_id(TraceId::parse(TRACE).unwrap());
        assert_eq!(ctx.to_header_value(), TRACE);

        let ctx = ctx
            .with_span_id(Some(SpanId::new(42)))
            .with_sampling(Sampled::Yes, true);
        assert_eq!(ctx.to_header_value(), format!("{TRACE}/42;o=3"));

        let ctx = ctx.with_sampling(Sampled::No, true);
        assert_eq!(ctx.to_string(), format!("{TRACE}/42;o=0"));
    }

    #[test]
    fn test_header_round_trip() {
        for sampled in [Sampled::Unknown, Sampled::Yes, Sampled::No] {
            let ctx = TraceContext::new()
                .with_span_id(Some(SpanId::generate()))
                .with_sampling(sampled, true);
            let parsed: TraceContext = ctx.to_header_value().parse().unwrap();
            assert_eq!(parsed, ctx);
        }
    }
}
