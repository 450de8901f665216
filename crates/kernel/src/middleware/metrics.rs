//! Request metrics middleware.

use std::time::Instant;

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};

use crate::state::AppState;

/// Count and time every request.
pub async fn track_requests(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let metrics = state.metrics();

    metrics.request_start();
    let started = Instant::now();
    let response = next.run(request).await;
    metrics.request_end();

    metrics.record_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );

    response
}
