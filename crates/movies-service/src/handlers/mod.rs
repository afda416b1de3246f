//! HTTP request handlers for the movies API.

pub mod health;
pub mod metrics;
pub mod movies;
pub mod users;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use movies::{create_movie, delete_movie, show_movie, update_movie};
pub use users::{activate_user, create_authentication_token, get_me, register_user};

use crate::errors::ApiError;
use axum::{extract::rejection::JsonRejection, Json};

/// Unwrap a JSON body, turning extractor rejections into `BadRequest` so
/// they render with the standard error envelope.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}
