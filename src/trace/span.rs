//! Span data model and well-known label keys.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::context::SpanId;

/// Well-known Cloud Trace label keys.
pub mod labels {
    pub const AGENT: &str = "/agent";
    pub const HTTP_HOST: &str = "/http/host";
    pub const HTTP_METHOD: &str = "/http/method";
    pub const HTTP_CLIENT_PROTOCOL: &str = "/http/client_protocol";
    pub const HTTP_USER_AGENT: &str = "/http/user_agent";
    pub const HTTP_URL: &str = "/http/url";
    pub const HTTP_STATUS_CODE: &str = "/http/status_code";
    pub const PID: &str = "/pid";
    pub const TID: &str = "/tid";
    pub const STACKTRACE: &str = "/stacktrace";
    pub const GAE_APP_MODULE: &str = "/gae/app/module";
    pub const GAE_APP_MODULE_VERSION: &str = "/gae/app/module_version";
}

/// Span kind as understood by Cloud Trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanKind {
    #[default]
    SpanKindUnspecified,
    RpcServer,
    RpcClient,
}

/// A named, timed unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    span_id: SpanId,
    parent_span_id: Option<SpanId>,
    name: String,
    kind: SpanKind,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    labels: BTreeMap<String, String>,
}

impl Span {
    /// Open a span now.
    pub fn start(name: impl Into<String>, kind: SpanKind, parent_span_id: Option<SpanId>) -> Self {
        Self {
            span_id: SpanId::generate(),
            parent_span_id,
            name: name.into(),
            kind,
            start_time: Utc::now(),
            end_time: None,
            labels: BTreeMap::new(),
        }
    }

    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    pub fn parent_span_id(&self) -> Option<SpanId> {
        self.parent_span_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SpanKind {
        self.kind
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn set_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.labels.insert(key.into(), value.into());
    }

    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }

    /// Close the span. Returns false if it was already closed.
    pub fn finish(&mut self) -> bool {
        if self.end_time.is_some() {
            return false;
        }
        self.end_time = Some(Utc::now().max(self.start_time));
        true
    }
}
