mod common;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use http::{Request, Response, StatusCode};
use regex::Regex;
use tower::{service_fn, Layer, ServiceExt};

use common::{CollectingSink, CountingSampler, FakeGoogle, FakeReporter, TOKEN};
use gcloud_lite::config::{GoogleConfig, ReportMode, TraceConfig};
use gcloud_lite::trace::{
    labels, AlwaysSampler, NeverSampler, Sampled, TraceHandle, TraceLayer, TRACE_CONTEXT_HEADER,
};

const UPSTREAM: &str = "0123456789abcdef0123456789abcdef";

async fn created(_req: Request<()>) -> Result<Response<String>, Infallible> {
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .body("created".to_string())
        .unwrap())
}

fn get(path: &str, trace_header: Option<&str>) -> Request<()> {
    let mut builder = Request::get(path).header("host", "example.com");
    if let Some(value) = trace_header {
        builder = builder.header(TRACE_CONTEXT_HEADER, value);
    }
    builder.body(()).unwrap()
}

fn response_header<B>(response: &Response<B>) -> String {
    response
        .headers()
        .get(TRACE_CONTEXT_HEADER)
        .expect("trace header missing")
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_excluded_health_check_is_not_sampled() {
    let reporter = FakeReporter::new();
    let sampler = CountingSampler::new(true);
    let layer = TraceLayer::builder(TraceConfig::default())
        .sampler(sampler.clone())
        .reporter(reporter.clone())
        .build()
        .unwrap();

    let response = layer
        .layer(service_fn(created))
        .oneshot(get("/_ah/health", None))
        .await
        .unwrap();

    let header = response_header(&response);
    assert!(Regex::new(r"^[0-9a-f]{32}/\d+;o=0$").unwrap().is_match(&header), "{header}");
    assert_eq!(sampler.calls(), 0);
    assert!(reporter.records().is_empty());
}

#[tokio::test]
async fn test_upstream_decision_is_trusted() {
    let reporter = FakeReporter::new();
    let sampler = CountingSampler::new(false);
    let layer = TraceLayer::builder(TraceConfig::default())
        .sampler(sampler.clone())
        .reporter(reporter.clone())
        .build()
        .unwrap();

    let response = layer
        .layer(service_fn(created))
        .oneshot(get("/orders", Some(&format!("{UPSTREAM}/42;o=1"))))
        .await
        .unwrap();

    assert_eq!(sampler.calls(), 0);
    let header = response_header(&response);
    assert!(header.starts_with(&format!("{UPSTREAM}/")));
    assert!(header.ends_with(";o=1"));

    let records = reporter.records();
    assert_eq!(records.len(), 1);
    let root = records[0].root();
    assert_eq!(records[0].trace_id().as_str(), UPSTREAM);
    assert_eq!(records[0].context().sampled(), Sampled::Yes);
    // Parent span id is discarded by default.
    assert_eq!(root.parent_span_id(), None);
    assert_eq!(root.name(), "/orders");
    assert_eq!(root.label(labels::HTTP_STATUS_CODE), Some("201"));
    assert_eq!(root.label(labels::HTTP_METHOD), Some("GET"));
    assert_eq!(root.label(labels::HTTP_HOST), Some("example.com"));
    assert_eq!(root.label(labels::HTTP_URL), Some("http://example.com/orders"));
    assert!(root.is_closed());
    assert!(header.contains(&format!("/{};", root.span_id())));
}

#[tokio::test]
async fn test_parent_span_kept_when_discard_disabled() {
    let reporter = FakeReporter::new();
    let config = TraceConfig {
        discard_parent_span_id: false,
        ..Default::default()
    };
    let layer = TraceLayer::builder(config)
        .reporter(reporter.clone())
        .build()
        .unwrap();

    layer
        .layer(service_fn(created))
        .oneshot(get("/orders", Some(&format!("{UPSTREAM}/42;o=1"))))
        .await
        .unwrap();

    let records = reporter.records();
    assert_eq!(records[0].root().parent_span_id().map(|id| id.value()), Some(42));
}

#[tokio::test]
async fn test_malformed_header_is_treated_as_absent() {
    let reporter = FakeReporter::new();
    let sampler = CountingSampler::new(true);
    let layer = TraceLayer::builder(TraceConfig::default())
        .sampler(sampler.clone())
        .reporter(reporter.clone())
        .build()
        .unwrap();

    let response = layer
        .layer(service_fn(created))
        .oneshot(get("/orders", Some("not-a-trace;o=0")))
        .await
        .unwrap();

    assert_eq!(sampler.calls(), 1);
    let header = response_header(&response);
    assert!(header.ends_with(";o=1"));
    assert!(!header.starts_with("not-a-trace"));
    assert_eq!(reporter.records().len(), 1);
}

#[tokio::test]
async fn test_reporter_failure_does_not_reach_caller() {
    let sink = CollectingSink::new();
    let layer = TraceLayer::builder(TraceConfig::default())
        .reporter(FakeReporter::failing())
        .error_sink(sink.clone())
        .build()
        .unwrap();

    let response = layer
        .layer(service_fn(created))
        .oneshot(get("/orders", Some(&format!("{UPSTREAM};o=1"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.into_body(), "created");
    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains(UPSTREAM));
    assert!(messages[0].contains("connection refused"));
}

#[tokio::test]
async fn test_short_upstream_trace_id_with_failing_reporter() {
    let sink = CollectingSink::new();
    let sampler = CountingSampler::new(false);
    let layer = TraceLayer::builder(TraceConfig::default())
        .sampler(sampler.clone())
        .reporter(FakeReporter::failing())
        .error_sink(sink.clone())
        .build()
        .unwrap();

    let response = layer
        .layer(service_fn(created))
        .oneshot(get("/orders", Some("abc;o=1")))
        .await
        .unwrap();

    assert_eq!(sampler.calls(), 0);
    let header = response_header(&response);
    assert!(header.starts_with("abc/"), "{header}");
    assert!(header.ends_with(";o=1"), "{header}");
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.into_body(), "created");

    let messages = sink.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("abc"));
    assert!(messages[0].contains("connection refused"));
}

#[tokio::test]
async fn test_reporter_failure_without_sink_is_swallowed() {
    let layer = TraceLayer::builder(TraceConfig::default())
        .reporter(FakeReporter::failing())
        .build()
        .unwrap();

    let response = layer
        .layer(service_fn(created))
        .oneshot(get("/orders", Some(&format!("{UPSTREAM};o=1"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_report_timeout_goes_to_sink() {
    let sink = CollectingSink::new();
    let config = TraceConfig {
        report_timeout_ms: 20,
        ..Default::default()
    };
    let layer = TraceLayer::builder(config)
        .reporter(FakeReporter::slow(Duration::from_secs(5)))
        .error_sink(sink.clone())
        .build()
        .unwrap();

    let response = tokio::time::timeout(
        Duration::from_secs(2),
        layer
            .layer(service_fn(created))
            .oneshot(get("/orders", Some(&format!("{UPSTREAM};o=1")))),
    )
    .await
    .expect("inline report must respect its timeout")
    .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(sink.messages()[0].contains("Timed out"));
}

#[tokio::test]
async fn test_handler_error_propagates_after_reporting() {
    let reporter = FakeReporter::new();
    let layer = TraceLayer::builder(TraceConfig::default())
        .sampler(Arc::new(AlwaysSampler))
        .reporter(reporter.clone())
        .build()
        .unwrap();

    let failing = service_fn(|_req: Request<()>| async {
        Err::<Response<String>, _>("handler failed")
    });
    let err = layer
        .layer(failing)
        .oneshot(get("/orders", None))
        .await
        .unwrap_err();
    assert_eq!(err, "handler failed");

    let records = reporter.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].root().is_closed());
    assert_eq!(records[0].root().label(labels::HTTP_STATUS_CODE), None);
}

#[tokio::test]
async fn test_panicking_handler_still_closes_and_reports() {
    let reporter = FakeReporter::new();
    let layer = TraceLayer::builder(TraceConfig::default())
        .sampler(Arc::new(AlwaysSampler))
        .reporter(reporter.clone())
        .build()
        .unwrap();

    let panicking = service_fn(|_req: Request<()>| async {
        if true {
            panic!("handler panicked");
        }
        Ok::<Response<String>, Infallible>(Response::new(String::new()))
    });
    let svc = layer.layer(panicking);
    let joined = tokio::spawn(svc.oneshot(get("/orders", None))).await;
    assert!(joined.unwrap_err().is_panic());

    let records = reporter.wait_for(1).await;
    assert_eq!(records.len(), 1);
    assert!(records[0].root().is_closed());
}

#[tokio::test]
async fn test_cancelled_request_still_reports() {
    let reporter = FakeReporter::new();
    let layer = TraceLayer::builder(TraceConfig::default())
        .sampler(Arc::new(AlwaysSampler))
        .reporter(reporter.clone())
        .build()
        .unwrap();

    let stalled = service_fn(|_req: Request<()>| async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok::<_, Infallible>(Response::new(String::new()))
    });
    let outcome = tokio::time::timeout(
        Duration::from_millis(20),
        layer.layer(stalled).oneshot(get("/slow", None)),
    )
    .await;
    assert!(outcome.is_err());

    let records = reporter.wait_for(1).await;
    assert_eq!(records[0].root().name(), "/slow");
    assert!(records[0].root().is_closed());
}

#[tokio::test]
async fn test_request_dropped_during_inline_report_still_reports() {
    let reporter = FakeReporter::slow(Duration::from_millis(200));
    let layer = TraceLayer::builder(TraceConfig::default())
        .sampler(Arc::new(AlwaysSampler))
        .reporter(reporter.clone())
        .build()
        .unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        layer.layer(service_fn(created)).oneshot(get("/orders", None)),
    )
    .await;
    assert!(outcome.is_err());
    assert!(reporter.records().is_empty());

    let records = reporter.wait_for(1).await;
    assert_eq!(records[0].root().label(labels::HTTP_STATUS_CODE), Some("201"));
}

#[tokio::test]
async fn test_request_dropped_during_inline_report_logs_failure() {
    let sink = CollectingSink::new();
    let layer = TraceLayer::builder(TraceConfig::default())
        .sampler(Arc::new(AlwaysSampler))
        .reporter(FakeReporter::slow_failing(Duration::from_millis(200)))
        .error_sink(sink.clone())
        .build()
        .unwrap();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        layer.layer(service_fn(created)).oneshot(get("/orders", None)),
    )
    .await;
    assert!(outcome.is_err());
    assert!(sink.messages().is_empty());

    let messages = sink.wait_for(1).await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("connection refused"));
}

#[tokio::test]
async fn test_stack_captured_only_when_sampled() {
    let config = TraceConfig {
        capture_stack: true,
        ..Default::default()
    };

    let reporter = FakeReporter::new();
    let layer = TraceLayer::builder(config.clone())
        .sampler(Arc::new(AlwaysSampler))
        .reporter(reporter.clone())
        .build()
        .unwrap();
    let response = layer
        .layer(service_fn(created))
        .oneshot(get("/orders", None))
        .await
        .unwrap();
    assert!(response_header(&response).ends_with(";o=3"));
    let stack = reporter.records()[0]
        .root()
        .label(labels::STACKTRACE)
        .map(str::to_string);
    assert!(stack.is_some_and(|s| s.contains("stack_frame")));

    let captured = Arc::new(std::sync::Mutex::new(None));
    let seen = captured.clone();
    let inspect = service_fn(move |req: Request<()>| {
        let seen = seen.clone();
        async move {
            let handle = req.extensions().get::<TraceHandle>().cloned();
            *seen.lock().unwrap() = handle;
            Ok::<_, Infallible>(Response::new(String::new()))
        }
    });
    let layer = TraceLayer::builder(config)
        .sampler(Arc::new(NeverSampler))
        .reporter(FakeReporter::new())
        .build()
        .unwrap();
    layer
        .layer(inspect)
        .oneshot(get("/orders", None))
        .await
        .unwrap();

    let handle = captured.lock().unwrap().take().unwrap();
    assert!(!handle.is_sampled());
    assert_eq!(handle.snapshot().root().label(labels::STACKTRACE), None);
}

#[tokio::test]
async fn test_handler_sees_handle_and_rewritten_header() {
    let reporter = FakeReporter::new();
    let layer = TraceLayer::builder(TraceConfig::default())
        .reporter(reporter.clone())
        .build()
        .unwrap();

    let handler = service_fn(|req: Request<()>| async move {
        let handle = req.extensions().get::<TraceHandle>().cloned().unwrap();
        let forwarded = req.headers()[TRACE_CONTEXT_HEADER].to_str().unwrap().to_string();
        assert_eq!(forwarded, handle.propagation_context().to_header_value());
        {
            let db = handle.span("db.query");
            db.set_label("/db/table", "orders");
        }
        Ok::<_, Infallible>(Response::new(String::new()))
    });

    layer
        .layer(handler)
        .oneshot(get("/orders", Some(&format!("{UPSTREAM}/7;o=1"))))
        .await
        .unwrap();

    let record = &reporter.records()[0];
    assert_eq!(record.children().len(), 1);
    let db = &record.children()[0];
    assert_eq!(db.name(), "db.query");
    assert_eq!(db.parent_span_id(), Some(record.root().span_id()));
    assert_eq!(db.label("/db/table"), Some("orders"));
    assert!(db.is_closed());
}

#[tokio::test]
async fn test_background_mode_does_not_delay_response() {
    let reporter = FakeReporter::slow(Duration::from_millis(200));
    let config = TraceConfig {
        report_mode: ReportMode::Background,
        ..Default::default()
    };
    let layer = TraceLayer::builder(config)
        .sampler(Arc::new(AlwaysSampler))
        .reporter(reporter.clone())
        .build()
        .unwrap();

    let response = layer
        .layer(service_fn(created))
        .oneshot(get("/orders", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(reporter.records().is_empty());

    assert_eq!(reporter.wait_for(1).await.len(), 1);
}

#[tokio::test]
async fn test_reports_to_cloud_trace_api() {
    let google = FakeGoogle::start().await;
    google.respond("PATCH /v1/projects/my-project/traces", 200, serde_json::json!({}));

    let config = TraceConfig {
        endpoint: google.url(),
        ..Default::default()
    };
    let layer = TraceLayer::builder(config)
        .google(GoogleConfig {
            project_id: Some("my-project".to_string()),
            access_token: Some(TOKEN.to_string()),
            ..Default::default()
        })
        .sampler(Arc::new(AlwaysSampler))
        .build()
        .unwrap();

    layer
        .layer(service_fn(created))
        .oneshot(get("/orders", Some(&format!("{UPSTREAM};o=1"))))
        .await
        .unwrap();

    let request = google.last_request();
    assert_eq!(request.method, http::Method::PATCH);
    assert_eq!(request.authorization.as_deref(), Some("Bearer test-token"));
    let trace = &request.body["traces"][0];
    assert_eq!(trace["projectId"], "my-project");
    assert_eq!(trace["traceId"], UPSTREAM);
    assert_eq!(trace["spans"][0]["name"], "/orders");
    assert_eq!(trace["spans"][0]["labels"]["/http/status_code"], "201");
}
