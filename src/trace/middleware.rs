//! Tower layer that traces every request.
//!
//! # Request lifecycle
//! ```text
//! headers parsed        → TraceContextResolver::resolve (decision made once)
//! root span opened      → labels: host, method, protocol, UA, URL, pid, tid
//! handler runs          → TraceHandle in request extensions
//! root span closed      → on Ok, Err, panic or cancellation (exactly once)
//! response annotated    → /http/status_code + X-Cloud-Trace-Context
//! record reported       → only when sampled; failures logged, never raised
//! ```
//!
//! # Design Decisions
//! - Handler errors pass through untouched
//! - Reporting is bounded by `report_timeout` and never retried
//! - A request future dropped before completion is closed and reported
//!   from `Drop`, on the current runtime
//! - A request future dropped while its inline report is in flight leaves
//!   the report running to completion

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use http::header::{HOST, USER_AGENT};
use http::{HeaderValue, Request, Response};
use tower::{Layer, Service};
use tracing::debug;

use super::context::TRACE_CONTEXT_HEADER;
use super::error::{TraceError, TraceResult};
use super::exclusion::PathExclusions;
use super::record::{TraceHandle, TraceRecord};
use super::reporter::{CloudTraceReporter, TraceReporter};
use super::resolver::{normalize_path, TraceContextResolver};
use super::sampler::{sampler_from_config, Sampler};
use super::sink::{report_failure, ErrorSink};
use super::span::labels;
use super::stack::capture_stack;
use crate::config::{AppConfig, GoogleConfig, ReportMode, TraceConfig};
use crate::google::{self, RestClient, TokenProvider};

struct Shared {
    resolver: TraceContextResolver,
    reporter: Arc<dyn TraceReporter>,
    sink: Option<Arc<dyn ErrorSink>>,
    report_timeout: Duration,
    report_mode: ReportMode,
    /// Labels that are the same for every request of this process.
    process_labels: Vec<(&'static str, String)>,
}

impl Shared {
    fn annotate_request<B>(&self, handle: &TraceHandle, req: &Request<B>) {
        let stack = handle.context().capture_stack().then(capture_stack);
        let host = req
            .headers()
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| req.uri().authority().map(|a| a.to_string()));

        handle.with_record(|record| {
            let root = record.root_mut();
            for (key, value) in &self.process_labels {
                root.set_label(*key, value.clone());
            }
            root.set_label(labels::HTTP_METHOD, req.method().as_str());
            root.set_label(labels::HTTP_CLIENT_PROTOCOL, format!("{:?}", req.version()));
            root.set_label(labels::HTTP_URL, request_url(req, host.as_deref()));
            root.set_label(labels::TID, format!("{:?}", std::thread::current().id()));
            if let Some(host) = host {
                root.set_label(labels::HTTP_HOST, host);
            }
            if let Some(agent) = req.headers().get(USER_AGENT).and_then(|v| v.to_str().ok()) {
                root.set_label(labels::HTTP_USER_AGENT, agent);
            }
            if let Some(stack) = stack {
                root.set_label(labels::STACKTRACE, stack);
            }
        });
    }

    async fn send_report(&self, record: &TraceRecord) {
        let outcome =
            tokio::time::timeout(self.report_timeout, self.reporter.patch_traces(record)).await;
        let message = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("Unable to report trace {}: {e}", record.trace_id()),
            Err(_) => format!(
                "Timed out reporting trace {} after {:?}",
                record.trace_id(),
                self.report_timeout
            ),
        };
        report_failure(self.sink.as_ref(), &message);
    }

    /// Inline mode awaits the spawned report, so a caller that drops the
    /// request future mid-report detaches the task instead of cancelling it.
    async fn report(self: Arc<Self>, record: TraceRecord) {
        if !record.context().sampled().is_sampled() {
            return;
        }
        let trace_id = record.trace_id().clone();
        let shared = self.clone();
        let task = tokio::spawn(async move { shared.send_report(&record).await });
        if self.report_mode == ReportMode::Inline {
            if let Err(e) = task.await {
                report_failure(
                    self.sink.as_ref(),
                    &format!("Reporting trace {trace_id} failed: {e}"),
                );
            }
        }
    }
}

fn request_url<B>(req: &Request<B>, host: Option<&str>) -> String {
    let uri = req.uri();
    if uri.scheme().is_some() && uri.authority().is_some() {
        return uri.to_string();
    }

    let scheme = req
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    match host {
        Some(host) => format!("{scheme}://{host}{path}"),
        None => path.to_string(),
    }
}

fn process_labels() -> Vec<(&'static str, String)> {
    let mut out = vec![
        (labels::AGENT, format!("gcloud-lite {}", env!("CARGO_PKG_VERSION"))),
        (labels::PID, std::process::id().to_string()),
    ];
    if let Ok(service) = std::env::var("GAE_SERVICE") {
        out.push((labels::GAE_APP_MODULE, service));
    }
    if let Ok(version) = std::env::var("GAE_VERSION") {
        out.push((labels::GAE_APP_MODULE_VERSION, version));
    }
    out
}

/// Builder for [`TraceLayer`].
pub struct TraceLayerBuilder {
    config: TraceConfig,
    google: GoogleConfig,
    sampler: Option<Arc<dyn Sampler>>,
    default_sampler: Option<Arc<dyn Sampler>>,
    reporter: Option<Arc<dyn TraceReporter>>,
    sink: Option<Arc<dyn ErrorSink>>,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl TraceLayerBuilder {
    pub fn new(config: TraceConfig) -> Self {
        Self {
            config,
            google: GoogleConfig::default(),
            sampler: None,
            default_sampler: None,
            reporter: None,
            sink: None,
            tokens: None,
        }
    }

    /// Project and credentials used when no reporter override is given.
    pub fn google(mut self, google: GoogleConfig) -> Self {
        self.google = google;
        self
    }

    /// Sampler consulted before the default sampler.
    pub fn sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Replace the default sampler built from `config.sampler`.
    pub fn default_sampler(mut self, sampler: Arc<dyn Sampler>) -> Self {
        self.default_sampler = Some(sampler);
        self
    }

    /// Report through `reporter` instead of Cloud Trace.
    pub fn reporter(mut self, reporter: Arc<dyn TraceReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Build the layer.
    ///
    /// # Errors
    ///
    /// - `TraceError::InvalidPattern` if an exclusion pattern does not compile
    /// - `TraceError::MissingProjectId` if no reporter was supplied and no
    ///   project id is configured
    /// - `TraceError::Reporter` if credentials or the endpoint are unusable
    pub fn build(self) -> TraceResult<TraceLayer> {
        let config = self.config;
        let exclusions =
            PathExclusions::from_config(&config.excluded_paths, &config.excluded_path_patterns)?;
        let default_sampler = self
            .default_sampler
            .unwrap_or_else(|| sampler_from_config(&config.sampler));

        let mut resolver = TraceContextResolver::new()
            .with_exclusions(exclusions)
            .with_capture_stack(config.capture_stack)
            .with_default_sampler(default_sampler)
            .with_discard_parent_span_id(config.discard_parent_span_id);
        if let Some(sampler) = self.sampler {
            resolver = resolver.with_sampler(sampler);
        }

        let report_timeout = Duration::from_millis(config.report_timeout_ms);
        let reporter = match self.reporter {
            Some(reporter) => reporter,
            None => {
                let project_id =
                    google::project_id(&self.google).ok_or(TraceError::MissingProjectId)?;
                let tokens = match self.tokens {
                    Some(tokens) => tokens,
                    None => google::token_provider(&self.google)?,
                };
                let client = RestClient::new(&config.endpoint, tokens)?;
                Arc::new(CloudTraceReporter::new(client, project_id).with_timeout(report_timeout))
                    as Arc<dyn TraceReporter>
            }
        };

        tracing::info!(
            resolver = ?resolver,
            report_mode = ?config.report_mode,
            report_timeout_ms = config.report_timeout_ms,
            "Trace layer configured"
        );

        Ok(TraceLayer {
            shared: Arc::new(Shared {
                resolver,
                reporter,
                sink: self.sink,
                report_timeout,
                report_mode: config.report_mode,
                process_labels: process_labels(),
            }),
        })
    }
}

/// Layer installing [`TraceService`].
#[derive(Clone)]
pub struct TraceLayer {
    shared: Arc<Shared>,
}

impl TraceLayer {
    pub fn builder(config: TraceConfig) -> TraceLayerBuilder {
        TraceLayerBuilder::new(config)
    }

    /// Layer reporting to Cloud Trace with the application configuration.
    pub fn from_config(config: &AppConfig) -> TraceResult<Self> {
        Self::builder(config.trace.clone())
            .google(config.google.clone())
            .build()
    }

    pub fn resolver(&self) -> &TraceContextResolver {
        &self.shared.resolver
    }
}

impl std::fmt::Debug for TraceLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceLayer")
            .field("resolver", &self.shared.resolver)
            .field("report_mode", &self.shared.report_mode)
            .finish()
    }
}

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TraceService {
            inner,
            shared: self.shared.clone(),
        }
    }
}

/// Service wrapping an inner HTTP service with request tracing.
#[derive(Clone)]
pub struct TraceService<S> {
    inner: S,
    shared: Arc<Shared>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TraceService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let path = normalize_path(req.uri().path());
        let context = self.shared.resolver.resolve(req.headers(), &path);
        let handle = TraceHandle::new(TraceRecord::new(context, path));
        self.shared.annotate_request(&handle, &req);

        // Downstream code sees the resolved context, not the raw inbound one.
        if let Ok(value) = HeaderValue::from_str(&handle.propagation_context().to_header_value()) {
            req.headers_mut().insert(TRACE_CONTEXT_HEADER, value);
        }
        req.extensions_mut().insert(handle.clone());

        let guard = RequestGuard {
            handle: Some(handle),
            shared: self.shared.clone(),
        };
        let future = self.inner.call(req);

        Box::pin(async move {
            let mut result = future.await;
            guard.complete(result.as_mut().ok()).await;
            result
        })
    }
}

/// Closes the root span on every exit path.
struct RequestGuard {
    handle: Option<TraceHandle>,
    shared: Arc<Shared>,
}

impl RequestGuard {
    async fn complete<B>(mut self, response: Option<&mut Response<B>>) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        if let Some(response) = response {
            handle.set_label(labels::HTTP_STATUS_CODE, response.status().as_u16().to_string());
            let header = handle.propagation_context().to_header_value();
            if let Ok(value) = HeaderValue::from_str(&header) {
                response.headers_mut().insert(TRACE_CONTEXT_HEADER, value);
            }
        }

        if let Some(record) = handle.finish() {
            self.shared.clone().report(record).await;
        }
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let Some(record) = handle.finish() else {
            return;
        };
        if !record.context().sampled().is_sampled() {
            return;
        }

        debug!(trace_id = %record.trace_id(), "Request ended early; reporting trace in background");
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let shared = self.shared.clone();
                runtime.spawn(async move { shared.send_report(&record).await });
            }
            Err(_) => report_failure(
                self.shared.sink.as_ref(),
                &format!("Dropped trace {}: no runtime to report on", record.trace_id()),
            ),
        }
    }
}
