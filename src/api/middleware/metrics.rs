use super::request_id::REQUEST_ID_HEADER;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::info;

/// Logs one `request_completed` event per request under the `metrics` target.
/// Must run inside `request_id_middleware` so the id is already assigned.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let response = next.run(req).await;
    let status = response.status();

    info!(
        target: "metrics",
        %method,
        %path,
        %request_id,
        status = status.as_u16(),
        failed = status.is_client_error() || status.is_server_error(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request_completed"
    );

    response
}
