//! Access token acquisition for Google Cloud APIs.
//!
//! Two kinds of provider sit behind [`TokenProvider`]:
//!
//! - **Static token**: a bearer token handed in by configuration or the
//!   environment (`GOOGLE_CLOUD_ACCESS_TOKEN`). Useful for local runs and tests.
//! - **Credentials**: `google-cloud-auth` credentials, loaded from one of
//!   - Application Default Credentials (`GOOGLE_APPLICATION_CREDENTIALS`,
//!     `gcloud auth application-default login`, or the instance's default
//!     service account)
//!   - inline service account JSON
//!   - a service account or authorized user JSON file
//!
//!   Token caching and refresh are handled by the credentials themselves.

use std::path::Path;

use async_trait::async_trait;
use google_cloud_auth::credentials::{
    service_account, user_account, Builder as CredentialsBuilder, CacheableResource, Credentials,
};
use http::{Extensions, HeaderMap};
use serde_json::Value;
use tracing::{debug, error};

use super::error::GoogleError;

/// OAuth2 scope covering Cloud Trace, Speech-to-Text and Pub/Sub.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Trait for providing access tokens.
///
/// Implemented as a trait so clients can be tested with a fixed token.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Retrieves a valid access token (without the `Bearer ` prefix).
    ///
    /// # Errors
    ///
    /// Returns `GoogleError::AuthenticationFailed` if no token can be obtained.
    async fn get_token(&self) -> Result<String, GoogleError>;
}

/// A token provider that always returns the same token.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Result<String, GoogleError> {
        if self.token.is_empty() {
            return Err(GoogleError::AuthenticationFailed(
                "Static access token is empty".to_string(),
            ));
        }
        Ok(self.token.clone())
    }
}

/// Where credentials come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    /// Application Default Credentials.
    ApplicationDefault,
    /// Service account JSON content.
    Json(String),
    /// Path to a service account or authorized user JSON file.
    File(String),
}

impl CredentialSource {
    /// Classify a `google.credentials` value: unset or blank is ADC, a JSON
    /// object is inline content, anything else is a file path.
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::ApplicationDefault,
            Some(v) if v.starts_with('{') => Self::Json(v.to_string()),
            Some(v) => Self::File(v.to_string()),
        }
    }

    /// Cheap checks that do not touch the network.
    ///
    /// # Errors
    ///
    /// Returns `GoogleError::ConfigurationError` for malformed JSON or a
    /// missing file.
    pub fn validate(&self) -> Result<(), GoogleError> {
        match self {
            Self::ApplicationDefault => Ok(()),
            Self::Json(json) => parse_json(json).map(|_| ()),
            Self::File(path) => {
                if path.contains("..") {
                    return Err(GoogleError::ConfigurationError(
                        "Invalid credential file path: path traversal not allowed".to_string(),
                    ));
                }
                if !Path::new(path).exists() {
                    return Err(GoogleError::ConfigurationError(format!(
                        "Credential file not found: {path}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// The `project_id` recorded in service account credentials, if any.
    pub fn project_id(&self) -> Option<String> {
        let json = match self {
            Self::ApplicationDefault => return None,
            Self::Json(json) => parse_json(json).ok()?,
            Self::File(path) => read_json(path).ok()?,
        };
        json.get("project_id")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }
}

fn parse_json(json: &str) -> Result<Value, GoogleError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| GoogleError::ConfigurationError(format!("Invalid credentials JSON: {e}")))?;
    if !value.is_object() {
        return Err(GoogleError::ConfigurationError(
            "Invalid credentials JSON: must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

fn read_json(path: &str) -> Result<Value, GoogleError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        GoogleError::ConfigurationError(format!("Failed to read credentials file '{path}': {e}"))
    })?;
    parse_json(&content)
}

/// Token provider backed by `google-cloud-auth` credentials.
pub struct CredentialsTokenProvider {
    credentials: Credentials,
}

impl std::fmt::Debug for CredentialsTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsTokenProvider")
            .field("credentials", &"<credentials>")
            .finish()
    }
}

impl CredentialsTokenProvider {
    /// Load credentials with the `cloud-platform` scope.
    ///
    /// # Errors
    ///
    /// - `GoogleError::ConfigurationError` if the source fails validation or
    ///   names an unsupported credential type
    /// - `GoogleError::AuthenticationFailed` if the credentials cannot be built
    pub fn new(source: CredentialSource) -> Result<Self, GoogleError> {
        Self::with_scopes(source, &[CLOUD_PLATFORM_SCOPE])
    }

    pub fn with_scopes<S: AsRef<str>>(
        source: CredentialSource,
        scopes: &[S],
    ) -> Result<Self, GoogleError> {
        source.validate()?;
        let scopes: Vec<String> = scopes.iter().map(|s| s.as_ref().to_string()).collect();

        let credentials = match &source {
            CredentialSource::ApplicationDefault => CredentialsBuilder::default()
                .with_scopes(scopes)
                .build()
                .map_err(|e| {
                    error!(error = %e, "Failed to load Application Default Credentials");
                    GoogleError::AuthenticationFailed(format!(
                        "Failed to load Application Default Credentials: {e}. \
                         Set GOOGLE_APPLICATION_CREDENTIALS or run 'gcloud auth application-default login'"
                    ))
                })?,
            CredentialSource::Json(json) => from_json(parse_json(json)?, scopes, "inline JSON")?,
            CredentialSource::File(path) => from_json(read_json(path)?, scopes, path)?,
        };

        debug!(source = source_kind(&source), "Google credentials loaded");
        Ok(Self { credentials })
    }
}

fn source_kind(source: &CredentialSource) -> &'static str {
    match source {
        CredentialSource::ApplicationDefault => "adc",
        CredentialSource::Json(_) => "json",
        CredentialSource::File(_) => "file",
    }
}

fn from_json(json: Value, scopes: Vec<String>, origin: &str) -> Result<Credentials, GoogleError> {
    let kind = json
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    let built = match kind.as_str() {
        "service_account" => service_account::Builder::new(json)
            .with_access_specifier(service_account::AccessSpecifier::from_scopes(scopes))
            .build(),
        "authorized_user" => user_account::Builder::new(json).with_scopes(scopes).build(),
        _ => {
            return Err(GoogleError::ConfigurationError(format!(
                "Unsupported credential type '{kind}' in {origin}; \
                 expected 'service_account' or 'authorized_user'"
            )))
        }
    };

    built.map_err(|e| {
        error!(error = %e, origin = %origin, "Failed to load credentials");
        GoogleError::AuthenticationFailed(format!(
            "Failed to load {kind} credentials from {origin}: {e}"
        ))
    })
}

/// Pull the bearer token out of the headers produced by the credentials.
fn bearer_token(headers: &HeaderMap) -> Result<String, GoogleError> {
    let value = headers
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            GoogleError::AuthenticationFailed("No Authorization header from credentials".to_string())
        })?
        .to_str()
        .map_err(|e| GoogleError::AuthenticationFailed(format!("Invalid Authorization header: {e}")))?;

    value
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| {
            GoogleError::AuthenticationFailed(
                "Authorization header is not a Bearer token".to_string(),
            )
        })
}

#[async_trait]
impl TokenProvider for CredentialsTokenProvider {
    async fn get_token(&self) -> Result<String, GoogleError> {
        let headers = self
            .credentials
            .headers(Extensions::new())
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch access token");
                GoogleError::AuthenticationFailed(format!("Failed to fetch access token: {e}"))
            })?;

        match headers {
            CacheableResource::New { data, .. } => bearer_token(&data),
            CacheableResource::NotModified => Err(GoogleError::AuthenticationFailed(
                "Credentials returned no headers".to_string(),
            )),
        }
    }
}
