//! Trace reporting to Cloud Trace.
//!
//! The reporter receives closed, sampled records. `CloudTraceReporter` sends
//! them with `PATCH v1/projects/{project}/traces` on the Cloud Trace REST API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::record::TraceRecord;
use super::span::{Span, SpanKind};
use crate::google::{Empty, GoogleError, RestClient};

/// Receives completed trace records.
#[async_trait]
pub trait TraceReporter: Send + Sync {
    async fn patch_traces(&self, record: &TraceRecord) -> Result<(), GoogleError>;
}

/// Request body of `projects.patchTraces`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Traces {
    pub traces: Vec<TraceResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TraceResource {
    pub project_id: String,
    pub trace_id: String,
    pub spans: Vec<SpanResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpanResource {
    /// u64 rendered as a decimal string.
    pub span_id: String,
    pub kind: SpanKind,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

fn timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl SpanResource {
    fn from_span(span: &Span) -> Self {
        // Reported records are closed; an open span reports a zero duration.
        let end = span.end_time().unwrap_or_else(|| span.start_time());
        Self {
            span_id: span.span_id().to_string(),
            kind: span.kind(),
            name: span.name().to_string(),
            start_time: timestamp(span.start_time()),
            end_time: timestamp(end),
            parent_span_id: span.parent_span_id().map(|id| id.to_string()),
            labels: span.labels().clone(),
        }
    }
}

impl Traces {
    /// Wire representation of one record.
    pub fn from_record(project_id: &str, record: &TraceRecord) -> Self {
        Self {
            traces: vec![TraceResource {
                project_id: project_id.to_string(),
                trace_id: record.trace_id().to_string(),
                spans: record.spans().map(SpanResource::from_span).collect(),
            }],
        }
    }
}

/// Reports to the Cloud Trace v1 API.
#[derive(Debug, Clone)]
pub struct CloudTraceReporter {
    client: RestClient,
    project_id: String,
    timeout: Option<Duration>,
}

impl CloudTraceReporter {
    pub fn new(client: RestClient, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            timeout: None,
        }
    }

    /// Per-call HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }
}

#[async_trait]
impl TraceReporter for CloudTraceReporter {
    async fn patch_traces(&self, record: &TraceRecord) -> Result<(), GoogleError> {
        let body = Traces::from_record(&self.project_id, record);
        let path = format!("v1/projects/{}/traces", self.project_id);
        self.client
            .send::<_, Empty>(Method::PATCH, &path, &[], Some(&body), self.timeout)
            .await?;
        tracing::debug!(
            trace_id = %record.trace_id(),
            spans = body.traces[0].spans.len(),
            "Reported trace"
        );
        Ok(())
    }
}
