//! Authenticated JSON/REST transport for Google Cloud APIs.
//!
//! # Responsibilities
//! - Resolve relative API paths against a service endpoint
//! - Attach `Authorization: Bearer` from a [`TokenProvider`]
//! - Map non-2xx responses to [`GoogleError::ApiError`]
//! - Decode JSON bodies (an empty body decodes as `{}`)

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::auth::TokenProvider;
use super::error::GoogleError;

/// Response type for calls whose body carries nothing (`DELETE`, `PATCH traces`).
#[derive(Debug, Default, Deserialize)]
pub struct Empty {}

/// A REST client bound to one service endpoint.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn TokenProvider>,
}

impl RestClient {
    /// Create a client for `endpoint` (e.g. `https://pubsub.googleapis.com`).
    ///
    /// # Errors
    ///
    /// Returns `GoogleError::ConfigurationError` if the endpoint is not an
    /// absolute http(s) URL.
    pub fn new(endpoint: &str, tokens: Arc<dyn TokenProvider>) -> Result<Self, GoogleError> {
        let parsed = Url::parse(endpoint).map_err(|e| {
            GoogleError::ConfigurationError(format!("Invalid endpoint URL '{endpoint}': {e}"))
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(GoogleError::ConfigurationError(format!(
                "Unsupported endpoint scheme '{}'",
                parsed.scheme()
            )));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Replace the underlying HTTP client (custom timeouts, proxies).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// Issue a request and decode the JSON response.
    pub async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        timeout: Option<Duration>,
    ) -> Result<T, GoogleError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.tokens.get_token().await?;
        let url = self.url(path);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        debug!(method = %method, url = %url, "Calling Google API");
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            warn!(method = %method, url = %url, status = %status, "Google API call failed");
            return Err(GoogleError::from_response(status.as_u16(), &body));
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GoogleError> {
        self.send::<(), T>(Method::GET, path, query, None, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GoogleError> {
        self.send(Method::POST, path, &[], Some(body), None).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GoogleError> {
        self.send(Method::PUT, path, &[], Some(body), None).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), GoogleError> {
        self.send::<(), Empty>(Method::DELETE, path, &[], None, None)
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
