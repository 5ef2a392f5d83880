use crate::app_state::AppState;
use crate::domain::Metrics;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;

/// Handler for the `/metrics` endpoint.
///
/// Returns metrics in Prometheus text format for scraping.
/// Uses the metrics implementation from AppState, which could be
/// either Prometheus or no-op depending on configuration.
pub async fn metrics_handler(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, StatusCode> {
    // ---

    let metrics_text = app_state.metrics().render();

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics_text,
    ))
}

/// Middleware recording duration and status for every request.
pub async fn track_http_metrics(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    // ---
    let start = Instant::now();
    let path = request.uri().path().to_owned();
    let method = request.method().clone();

    let response = next.run(request).await;

    state
        .metrics()
        .record_http_request(start, &path, method.as_str(), response.status().as_u16());

    response
}
