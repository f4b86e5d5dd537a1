//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Project and credentials shared by all Google clients.
    pub google: GoogleConfig,

    /// Trace middleware settings.
    pub trace: TraceConfig,

    /// Speech-to-Text client settings.
    pub speech: SpeechConfig,

    /// Pub/Sub client settings.
    pub pubsub: PubSubConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of the human format.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Google Cloud project and credentials.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GoogleConfig {
    /// Project id; falls back to `GOOGLE_CLOUD_PROJECT`.
    pub project_id: Option<String>,

    /// Pre-issued bearer token; falls back to `GOOGLE_CLOUD_ACCESS_TOKEN`.
    pub access_token: Option<String>,

    /// Service account JSON content or a path to a credentials file. Unset
    /// means Application Default Credentials.
    pub credentials: Option<String>,
}

/// When the trace report is sent relative to the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// Awaited before the response is handed back (bounded by the timeout).
    #[default]
    Inline,
    /// Spawned on the runtime; the response is not delayed.
    Background,
}

/// Trace middleware configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Install the trace layer at all.
    pub enabled: bool,

    /// Cloud Trace API endpoint.
    pub endpoint: String,

    /// Paths that are never sampled (exact match).
    pub excluded_paths: Vec<String>,

    /// Paths that are never sampled (regular expressions).
    pub excluded_path_patterns: Vec<String>,

    /// Attach a stack trace to sampled root spans.
    pub capture_stack: bool,

    /// Drop the inbound parent span id before opening the root span.
    ///
    /// Works around the backend mis-parenting root spans that carry a remote
    /// parent. Remove once the backend handles remote parents.
    pub discard_parent_span_id: bool,

    /// Upper bound on one report call, in milliseconds.
    pub report_timeout_ms: u64,

    /// Inline or background reporting.
    pub report_mode: ReportMode,

    /// Default sampling policy.
    pub sampler: SamplerConfig,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://cloudtrace.googleapis.com".to_string(),
            excluded_paths: vec!["/_ah/health".to_string()],
            excluded_path_patterns: Vec::new(),
            capture_stack: false,
            discard_parent_span_id: true,
            report_timeout_ms: 2000,
            report_mode: ReportMode::Inline,
            sampler: SamplerConfig::default(),
        }
    }
}

/// Kind of default sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    /// Sample every request.
    Always,
    /// Sample nothing.
    Never,
    /// Sample each request with a fixed probability.
    Probability,
    /// Sample at most `qps` requests per second.
    #[default]
    Rate,
}

/// Default sampler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub kind: SamplerKind,

    /// Samples per second for `rate`.
    pub qps: f64,

    /// Probability in [0, 1] for `probability`.
    pub probability: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            kind: SamplerKind::Rate,
            qps: 0.1,
            probability: 0.1,
        }
    }
}

/// Speech-to-Text client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub endpoint: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://speech.googleapis.com".to_string(),
        }
    }
}

/// Pub/Sub client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PubSubConfig {
    pub endpoint: String,

    /// Page size used by list calls.
    pub page_size: u32,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://pubsub.googleapis.com".to_string(),
            page_size: 100,
        }
    }
}
