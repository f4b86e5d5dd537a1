//! Google Cloud REST infrastructure shared by the service clients.
//!
//! # Data Flow
//! ```text
//! service client (trace / speech / pubsub)
//!     → rest.rs (URL, bearer auth, JSON encode)
//!     → auth.rs (TokenProvider: static token or google-cloud-auth credentials)
//!     → HTTPS call
//!     → rest.rs (status check, JSON decode)
//!     → error.rs (GoogleError on failure)
//! ```
//!
//! # Design Decisions
//! - JSON/REST surface only; no gRPC stubs
//! - One error type for every Google API call
//! - Token source is a trait so tests run without credentials

pub mod auth;
pub mod error;
pub mod rest;

pub use auth::{
    CredentialSource, CredentialsTokenProvider, StaticTokenProvider, TokenProvider,
    CLOUD_PLATFORM_SCOPE,
};
pub use error::GoogleError;
pub use rest::{Empty, RestClient};

use std::sync::Arc;

use crate::config::GoogleConfig;

/// Environment variable holding a pre-issued access token.
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_CLOUD_ACCESS_TOKEN";

/// Environment variable naming the default project.
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Pick a token provider for the given configuration.
///
/// An explicit token (config, then `GOOGLE_CLOUD_ACCESS_TOKEN`) wins;
/// otherwise credentials are loaded from `google.credentials`, falling back
/// to Application Default Credentials.
///
/// # Errors
///
/// Returns the `GoogleError` from loading the credentials.
pub fn token_provider(config: &GoogleConfig) -> Result<Arc<dyn TokenProvider>, GoogleError> {
    let token = config
        .access_token
        .clone()
        .or_else(|| std::env::var(ACCESS_TOKEN_ENV).ok())
        .filter(|t| !t.is_empty());

    match token {
        Some(token) => Ok(Arc::new(StaticTokenProvider::new(token))),
        None => {
            let source = CredentialSource::from_setting(config.credentials.as_deref());
            Ok(Arc::new(CredentialsTokenProvider::new(source)?))
        }
    }
}

/// Resolve the project id from configuration, `GOOGLE_CLOUD_PROJECT`, or the
/// configured service account credentials.
pub fn project_id(config: &GoogleConfig) -> Option<String> {
    config
        .project_id
        .clone()
        .or_else(|| std::env::var(PROJECT_ENV).ok())
        .filter(|p| !p.is_empty())
        .or_else(|| {
            config
                .credentials
                .as_deref()
                .and_then(|c| CredentialSource::from_setting(Some(c)).project_id())
        })
}
