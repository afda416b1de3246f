//! HTTP metrics middleware.
//!
//! Records every response, including ones produced before a handler runs:
//! authentication rejections, gate rejections, 404/405 from the router and
//! JSON rejections from extractors.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records method, normalized path, status and duration.
///
/// Applied outside the authentication layer so rejected requests count too.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}
