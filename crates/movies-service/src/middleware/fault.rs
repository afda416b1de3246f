//! Request fault boundary.
//!
//! A panic inside a handler or middleware becomes a generic 500 with
//! `Connection: close`. The process keeps serving other requests.

use crate::errors::ApiError;
use crate::tasks::supervisor::panic_message;
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use std::any::Any;
use tower_http::catch_panic::CatchPanicLayer;

/// Layer that converts request panics into 500 responses.
pub fn fault_boundary() -> CatchPanicLayer<fn(Box<dyn Any + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(panic_response as fn(Box<dyn Any + Send + 'static>) -> Response)
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!(
        target: "movies.middleware.fault",
        panic = %panic_message(payload),
        "Request handler panicked"
    );

    let mut response = ApiError::Internal.into_response();
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
