//! User handlers.
//!
//! - `POST /v1/users` - register (public)
//! - `PUT /v1/users/activated` - activate with an activation token (public)
//! - `POST /v1/users/authentication` - exchange credentials for a token (public)
//! - `GET /v1/users/me` - the caller's own record (activated)

use crate::errors::ApiError;
use crate::handlers::json_body;
use crate::middleware::CurrentIdentity;
use crate::models::{
    ActivateUserRequest, AuthenticationResponse, AuthenticationTokenBody, CurrentUserResponse,
    LoginRequest, RegisterUserRequest, UserResponse,
};
use crate::routes::AppState;
use crate::services::user_service;
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/users
#[instrument(skip_all, name = "movies.handler.register_user")]
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let request = json_body(payload)?;

    let user = user_service::register(
        &state.store,
        &state.supervisor,
        state.mailer.clone(),
        state.config.bcrypt_cost,
        request,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "an email will be sent to you containing activation instructions"
                .to_string(),
            user,
        }),
    ))
}

/// Handler for PUT /v1/users/activated
#[instrument(skip_all, name = "movies.handler.activate_user")]
pub async fn activate_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ActivateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let request = json_body(payload)?;

    let user = user_service::activate(&state.store, &request.token).await?;

    Ok(Json(UserResponse {
        message: "your account has been activated".to_string(),
        user,
    }))
}

/// Handler for POST /v1/users/authentication
#[instrument(skip_all, name = "movies.handler.create_authentication_token")]
pub async fn create_authentication_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthenticationResponse>), ApiError> {
    let request = json_body(payload)?;

    let token = user_service::login(&state.store, &request.email, request.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthenticationResponse {
            message: "authentication token issued".to_string(),
            authentication_token: AuthenticationTokenBody {
                token: token.plaintext.expose_secret().to_string(),
                expiry: token.expiry,
            },
        }),
    ))
}

/// Handler for GET /v1/users/me
///
/// Sits behind the activation gate, so the identity is always a user here.
pub async fn get_me(
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<CurrentUserResponse>, ApiError> {
    let user = identity.user().cloned().ok_or(ApiError::Unauthenticated)?;
    Ok(Json(CurrentUserResponse { user }))
}
