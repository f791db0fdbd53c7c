//! Axum middleware for automatic request tracking.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::client::TelemetryClient;
use crate::correlation::{generate_trace_id, OperationContext};
use crate::metric::global_aggregator;
use crate::request::RequestTelemetry;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Records one request entry per call and keeps `x-request-id` correlation.
///
/// An incoming `x-request-id` header is reused as the operation ID so
/// entries join the caller's trace; otherwise a new one is generated. The
/// response always carries the header back. Durations also feed the global
/// metric aggregator under `http.server.duration_ms`.
///
/// Install with `axum::middleware::from_fn_with_state` and an
/// `Arc<TelemetryClient>` as state.
pub async fn telemetry_middleware(
    State(client): State<Arc<TelemetryClient>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(generate_trace_id);

    // Insert/overwrite so downstream handlers can read it
    request.headers_mut().insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&request_id)
            .unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    );

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let url = request.uri().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();
    let mut response = next.run(request).instrument(span).await;
    let duration = start.elapsed();
    let status = response.status().as_u16();

    let operation = OperationContext::continued(request_id.clone())
        .with_name(format!("{method} {path}"));
    let entry = RequestTelemetry::new(&method, &path, status, duration)
        .with_url(url)
        .with_operation(operation);
    if let Err(err) = client.track_request(entry) {
        tracing::warn!(%err, "dropping request telemetry");
    }

    let status_label = status.to_string();
    let _ = global_aggregator().record(
        "http.server.duration_ms",
        &[("method", &method), ("status", &status_label)],
        duration.as_secs_f64() * 1000.0,
    );

    // Attach the request ID to the response
    if let Ok(val) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, val);
    }

    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
