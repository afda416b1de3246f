//! Authentication middleware.
//!
//! Runs on every route. Resolves the `Authorization` header into an
//! [`Identity`] and stores it in the request extensions before any gate or
//! handler runs:
//!
//! - no header: `Identity::Anonymous`
//! - `Bearer <token>` with a well-formed token that validates:
//!   `Identity::Authenticated(user)`
//! - any other header value: 401 (`MalformedCredential`)
//! - a well-formed token that does not validate: 401 (`InvalidCredential`)
//!
//! Handlers and gates read the identity through [`CurrentIdentity`].

use crate::crypto::is_token_shaped;
use crate::errors::ApiError;
use crate::models::{Identity, TokenScope};
use crate::repositories::Store;
use crate::services::token_service;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub store: Store,
}

/// Extract the bearer token, if any.
///
/// `Ok(None)` means no credential was presented.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| {
        tracing::debug!(target: "movies.middleware.auth", "Non-ASCII Authorization header");
        ApiError::MalformedCredential
    })?;

    let token = value.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "movies.middleware.auth", "Invalid Authorization header format");
        ApiError::MalformedCredential
    })?;

    if !is_token_shaped(token) {
        tracing::debug!(target: "movies.middleware.auth", "Bearer token has the wrong shape");
        return Err(ApiError::MalformedCredential);
    }

    Ok(Some(token))
}

/// Resolve request headers into an identity.
pub async fn resolve_identity(store: &Store, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let Some(token) = extract_bearer_token(headers)? else {
        return Ok(Identity::Anonymous);
    };

    match token_service::validate(store, TokenScope::Authentication, token).await {
        Ok(user) => Ok(Identity::Authenticated(user)),
        Err(ApiError::NotFound(_)) => Err(ApiError::InvalidCredential),
        Err(e) => Err(e),
    }
}

/// Authentication middleware.
///
/// Always sets `Vary: Authorization` since the response depends on it.
#[instrument(skip_all, name = "movies.middleware.authenticate")]
pub async fn authenticate(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    let mut response = match resolve_identity(&state.store, req.headers()).await {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// The identity resolved for this request.
///
/// Missing only if the authentication middleware was not applied, which is a
/// wiring fault and surfaces as a generic 500.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or_else(|| {
                tracing::error!(
                    target: "movies.middleware.auth",
                    "Identity missing from request extensions"
                );
                ApiError::Internal
            })
    }
}
