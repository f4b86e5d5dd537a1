//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use gcloud_lite::google::{GoogleError, RestClient, StaticTokenProvider};
use gcloud_lite::trace::{ErrorSink, Sampler, TraceRecord, TraceReporter};

pub const TOKEN: &str = "test-token";

/// A request received by the fake Google API.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct FakeState {
    responses: Mutex<HashMap<String, (StatusCode, Value)>>,
    requests: Mutex<Vec<Recorded>>,
}

/// In-process stand-in for a Google REST endpoint.
///
/// Responses are keyed by `"METHOD /path?query"`, falling back to
/// `"METHOD /path"`. Unknown routes answer 404 in the Google error format.
#[derive(Clone)]
pub struct FakeGoogle {
    addr: SocketAddr,
    state: Arc<FakeState>,
}

impl FakeGoogle {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn rest_client(&self) -> RestClient {
        RestClient::new(&self.url(), Arc::new(StaticTokenProvider::new(TOKEN))).unwrap()
    }

    pub fn respond(&self, route: &str, status: u16, body: Value) {
        self.state.responses.lock().unwrap().insert(
            route.to_string(),
            (StatusCode::from_u16(status).unwrap(), body),
        );
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("no request received")
    }
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    state.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let full = match uri.query() {
        Some(query) => format!("{method} {}?{query}", uri.path()),
        None => format!("{method} {}", uri.path()),
    };
    let short = format!("{method} {}", uri.path());

    let responses = state.responses.lock().unwrap();
    match responses.get(&full).or_else(|| responses.get(&short)) {
        Some((status, body)) => (*status, Json(body.clone())),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {"code": 404, "message": "Resource not found", "status": "NOT_FOUND"}
            })),
        ),
    }
}

/// Reporter that stores records, optionally failing or stalling.
#[derive(Default)]
pub struct FakeReporter {
    records: Mutex<Vec<TraceRecord>>,
    fail: bool,
    delay: Option<Duration>,
}

impl FakeReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn slow_failing(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            delay: Some(delay),
            ..Default::default()
        })
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Wait until at least `count` records arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<TraceRecord> {
        for _ in 0..200 {
            let records = self.records();
            if records.len() >= count {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} reported traces, got {}", self.records().len());
    }
}

#[async_trait]
impl TraceReporter for FakeReporter {
    async fn patch_traces(&self, record: &TraceRecord) -> Result<(), GoogleError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(GoogleError::NetworkError("connection refused".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Sampler with a fixed answer that counts how often it was asked.
pub struct CountingSampler {
    answer: bool,
    calls: AtomicUsize,
}

impl CountingSampler {
    pub fn new(answer: bool) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Sampler for CountingSampler {
    fn check(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }

    fn description(&self) -> String {
        format!("counting({})", self.answer)
    }
}

/// Sink that keeps every message.
#[derive(Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    /// Wait until at least `count` messages arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let messages = self.messages();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} sink messages, got {}", self.messages().len());
    }
}

impl ErrorSink for CollectingSink {
    fn error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
