//! Request Timing
//!
//! Records every routed request in the [`PerformanceTracker`] under its
//! matched route pattern, e.g. `/data/:kind`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::metrics::{OperationStatus, PerformanceTracker};

/// Only server errors count as failures; 4xx answers are the client's problem.
pub async fn track_requests(
    State(tracker): State<Arc<PerformanceTracker>>,
    request: Request,
    next: Next,
) -> Response {
    let name = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    let status = if response.status().is_server_error() {
        OperationStatus::Error
    } else {
        OperationStatus::Success
    };
    tracker.track(name, duration_ms, status);

    response
}
