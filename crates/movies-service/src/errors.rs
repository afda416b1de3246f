//! Movies API error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Authentication and authorization failures only ever reveal the coarse
//! category. Internal faults (database, store timeout, hashing) return a
//! generic message to the client and log the detail server-side.

use crate::validation::FieldErrors;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Movies API error type.
///
/// Maps to HTTP status codes:
/// - MalformedCredential, InvalidCredential, Unauthenticated, LoginFailed: 401
/// - NotActivated, Forbidden: 403
/// - NotFound: 404
/// - EditConflict: 409
/// - DuplicateUnique, Validation: 422
/// - RateLimitExceeded: 429
/// - BadRequest: 400
/// - StoreTimeout, HashingFailure, Database, Internal: 500
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Malformed credential")]
    MalformedCredential,

    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Invalid login credentials")]
    LoginFailed,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Account not activated")]
    NotActivated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate value for unique field: {field}")]
    DuplicateUnique { field: String, message: String },

    #[error("Edit conflict")]
    EditConflict,

    #[error("Store operation exceeded its deadline: {0}")]
    StoreTimeout(String),

    #[error("Hashing failure: {0}")]
    HashingFailure(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::MalformedCredential
            | ApiError::InvalidCredential
            | ApiError::LoginFailed
            | ApiError::Unauthenticated => 401,
            ApiError::NotActivated | ApiError::Forbidden => 403,
            ApiError::NotFound(_) => 404,
            ApiError::EditConflict => 409,
            ApiError::DuplicateUnique { .. } | ApiError::Validation(_) => 422,
            ApiError::RateLimitExceeded { .. } => 429,
            ApiError::BadRequest(_) => 400,
            ApiError::StoreTimeout(_)
            | ApiError::HashingFailure(_)
            | ApiError::Database(_)
            | ApiError::Internal => 500,
        }
    }

    /// Build a validation error for a single field.
    pub fn field(field: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), message.to_string());
        ApiError::Validation(fields)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

const INTERNAL_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            ApiError::RateLimitExceeded {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        };

        let (status, code, message, fields) = match self {
            ApiError::MalformedCredential | ApiError::InvalidCredential => (
                StatusCode::UNAUTHORIZED,
                "INVALID_AUTHENTICATION_TOKEN",
                "invalid or missing authentication token".to_string(),
                None,
            ),
            ApiError::LoginFailed => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "invalid authentication credentials".to_string(),
                None,
            ),
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_REQUIRED",
                "you must be authenticated to access this resource".to_string(),
                None,
            ),
            ApiError::NotActivated => (
                StatusCode::FORBIDDEN,
                "ACCOUNT_NOT_ACTIVATED",
                "your user account must be activated to access this resource".to_string(),
                None,
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "your user account doesn't have the necessary permissions to access this resource"
                    .to_string(),
                None,
            ),
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("{} not found", resource),
                None,
            ),
            ApiError::DuplicateUnique { field, message } => {
                let mut fields = FieldErrors::new();
                fields.insert(field, message);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "VALIDATION_FAILED",
                    "the request contains invalid fields".to_string(),
                    Some(fields),
                )
            }
            ApiError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_FAILED",
                "the request contains invalid fields".to_string(),
                Some(fields),
            ),
            ApiError::EditConflict => (
                StatusCode::CONFLICT,
                "EDIT_CONFLICT",
                "unable to update the record due to an edit conflict, please try again"
                    .to_string(),
                None,
            ),
            ApiError::RateLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                "rate limit exceeded, please slow down".to_string(),
                None,
            ),
            ApiError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason, None)
            }
            ApiError::StoreTimeout(operation) => {
                tracing::error!(target: "movies.store", operation = %operation, "Store call exceeded deadline");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                    None,
                )
            }
            ApiError::HashingFailure(err) => {
                tracing::error!(target: "movies.crypto", error = %err, "Hashing operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                    None,
                )
            }
            ApiError::Database(err) => {
                tracing::error!(target: "movies.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    INTERNAL_MESSAGE.to_string(),
                    None,
                )
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                fields,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }

        response
    }
}

/// Convert sqlx errors to ApiError
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}
