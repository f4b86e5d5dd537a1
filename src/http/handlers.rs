//! Demo handlers served behind the trace layer.

use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use crate::trace::{labels, TraceHandle};

/// Liveness check; excluded from sampling by default.
pub async fn health() -> &'static str {
    "ok"
}

/// Echo the trace context this request was assigned.
pub async fn index(request: Request) -> impl IntoResponse {
    match request.extensions().get::<TraceHandle>() {
        Some(handle) => Json(json!({
            "trace_id": handle.trace_id().to_string(),
            "span_id": handle.root_span_id().to_string(),
            "sampled": handle.is_sampled(),
        }))
        .into_response(),
        None => Json(json!({ "trace_id": null })).into_response(),
    }
}

/// Record nested child spans under the root span.
pub async fn work(request: Request) -> impl IntoResponse {
    let Some(handle) = request.extensions().get::<TraceHandle>().cloned() else {
        return (StatusCode::OK, "untraced").into_response();
    };

    let lookup = handle.span("lookup");
    lookup.set_label(labels::HTTP_METHOD, request.method().as_str());
    {
        let render = lookup.child("render");
        render.set_label("/demo/items", "3");
    }
    drop(lookup);

    (StatusCode::OK, "done").into_response()
}

/// Fails with 500 so error responses can be observed in traces.
pub async fn fail() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "failed")
}
