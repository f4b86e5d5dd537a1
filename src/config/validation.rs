//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ratios in [0, 1])
//! - Check that exclusion patterns compile
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use regex::Regex;
use url::Url;

use crate::config::schema::{AppConfig, SamplerKind};
use crate::google::CredentialSource;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    let trace = &config.trace;
    if trace.report_timeout_ms == 0 {
        errors.push(ValidationError::new("trace.report_timeout_ms", "must be > 0"));
    }

    for (i, pattern) in trace.excluded_path_patterns.iter().enumerate() {
        if let Err(e) = Regex::new(pattern) {
            errors.push(ValidationError::new(
                format!("trace.excluded_path_patterns[{i}]"),
                format!("invalid pattern: {e}"),
            ));
        }
    }

    match trace.sampler.kind {
        SamplerKind::Rate if !(trace.sampler.qps.is_finite() && trace.sampler.qps > 0.0) => {
            errors.push(ValidationError::new("trace.sampler.qps", "must be > 0"));
        }
        SamplerKind::Probability if !(0.0..=1.0).contains(&trace.sampler.probability) => {
            errors.push(ValidationError::new(
                "trace.sampler.probability",
                "must be within [0, 1]",
            ));
        }
        _ => {}
    }

    for (field, endpoint) in [
        ("trace.endpoint", &trace.endpoint),
        ("speech.endpoint", &config.speech.endpoint),
        ("pubsub.endpoint", &config.pubsub.endpoint),
    ] {
        if Url::parse(endpoint).is_err() {
            errors.push(ValidationError::new(field, format!("'{endpoint}' is not a URL")));
        }
    }

    if let Err(e) = CredentialSource::from_setting(config.google.credentials.as_deref()).validate()
    {
        errors.push(ValidationError::new("google.credentials", e.to_string()));
    }

    if config.pubsub.page_size == 0 {
        errors.push(ValidationError::new("pubsub.page_size", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
