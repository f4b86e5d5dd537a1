//! Google Cloud API error types.
//!
//! Shared by every REST client in the crate (Cloud Trace, Speech, Pub/Sub).

use serde::Deserialize;

/// Error types for Google Cloud API operations.
#[derive(Debug, thiserror::Error)]
pub enum GoogleError {
    /// Access token could not be obtained.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid client-side input (bad endpoint, missing project, bad audio).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Network-level failure (connect, DNS, timeout).
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Non-success response from the API.
    #[error("API error ({code} {status}): {message}")]
    ApiError {
        code: u16,
        status: String,
        message: String,
    },

    /// Response body could not be decoded.
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Local I/O failure (reading an audio file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GoogleError {
    /// Returns true for a 404 / NOT_FOUND API response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { code: 404, .. })
    }

    /// Returns true for a 409 / ALREADY_EXISTS API response.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::ApiError { code: 409, .. })
    }

    /// Builds an API error from an HTTP status and the raw response body.
    ///
    /// Google APIs answer with `{"error": {"code", "message", "status"}}`;
    /// anything else is kept verbatim as the message.
    pub fn from_response(code: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            error: ErrorBody,
        }

        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            message: String,
            #[serde(default)]
            status: String,
        }

        match serde_json::from_str::<Envelope>(body) {
            Ok(envelope) => Self::ApiError {
                code,
                status: envelope.error.status,
                message: envelope.error.message,
            },
            Err(_) => Self::ApiError {
                code,
                status: String::new(),
                message: body.trim().to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for GoogleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::DecodeError(e.to_string())
        } else {
            Self::NetworkError(e.to_string())
        }
    }
}

impl From<serde_json::Error> for GoogleError {
    fn from(e: serde_json::Error) -> Self {
        Self::DecodeError(e.to_string())
    }
}
