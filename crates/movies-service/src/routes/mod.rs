//! HTTP routes for the movies API.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{
    activated_only, authenticate, fault_boundary, http_metrics_middleware, permission_gate,
    rate_limit, AuthState, ClientRateLimiter, PermissionGate,
};
use crate::models::PermissionCode;
use crate::repositories::Store;
use crate::services::{GrantSource, Mailer};
use crate::tasks::TaskSupervisor;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

/// Whole-request timeout.
pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// How long browsers may cache a preflight answer.
const CORS_MAX_AGE_SECONDS: u64 = 60;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Deadline-bounded access to the database.
    pub store: Store,

    /// Service configuration.
    pub config: Config,

    /// Outbound mail for activation tokens.
    pub mailer: Arc<dyn Mailer>,

    /// Owner of fire-and-forget background work.
    pub supervisor: TaskSupervisor,

    /// Permission lookups for the authorizer.
    pub grants: Arc<dyn GrantSource>,

    /// Per-client rate limiter, `None` when limiting is disabled.
    pub rate_limiter: Option<ClientRateLimiter>,
}

/// Build the application routes.
///
/// - `/health`, `/ready`, `/metrics` - operational, public
/// - `POST /v1/users`, `PUT /v1/users/activated`,
///   `POST /v1/users/authentication` - public
/// - `GET /v1/users/me` - activated
/// - `POST /v1/movies`, `PATCH|DELETE /v1/movies/:id` - `movies:write`
/// - `GET /v1/movies/:id` - `movies:read`
///
/// Every route runs behind the authentication middleware, so a malformed or
/// invalid credential is rejected even on public routes.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = AuthState {
        store: state.store.clone(),
    };
    let cors = cors_layer(&state.config.cors_trusted_origins);
    let rate_limiter = state.rate_limiter.clone();
    let read_gate = PermissionGate::new(state.grants.clone(), PermissionCode::MoviesRead);
    let write_gate = PermissionGate::new(state.grants.clone(), PermissionCode::MoviesWrite);

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/v1/users", post(handlers::register_user))
        .route("/v1/users/activated", put(handlers::activate_user))
        .route(
            "/v1/users/authentication",
            post(handlers::create_authentication_token),
        )
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let user_routes = Router::new()
        .route("/v1/users/me", get(handlers::get_me))
        .route_layer(middleware::from_fn(activated_only));

    // Gates are attached per method so GET and PATCH on the same path can
    // require different permissions.
    let movie_routes = Router::new()
        .route(
            "/v1/movies",
            post(handlers::create_movie).route_layer(middleware::from_fn_with_state(
                write_gate.clone(),
                permission_gate,
            )),
        )
        .route(
            "/v1/movies/:id",
            get(handlers::show_movie)
                .route_layer(middleware::from_fn_with_state(read_gate, permission_gate))
                .merge(
                    patch(handlers::update_movie)
                        .delete(handlers::delete_movie)
                        .route_layer(middleware::from_fn_with_state(
                            write_gate,
                            permission_gate,
                        )),
                ),
        )
        .with_state(state);

    // Layer order (innermost first):
    // 1. authenticate - resolve identity before any gate or handler
    // 2. cors - preflights are answered without authentication
    // 3. rate_limit - when enabled, before any credential work
    // 4. fault_boundary - panics become a generic 500
    // 5. TimeoutLayer
    // 6. TraceLayer
    // 7. http_metrics_middleware - records every response
    let mut router = public_routes
        .merge(metrics_routes)
        .merge(user_routes)
        .merge(movie_routes)
        .layer(middleware::from_fn_with_state(auth_state, authenticate))
        .layer(cors);

    if let Some(limiter) = rate_limiter {
        router = router.layer(middleware::from_fn_with_state(limiter, rate_limit));
    }

    router
        .layer(fault_boundary())
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECONDS)))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// CORS policy. No trusted origins configured means any origin may call the
/// API; credentials travel in the `Authorization` header, never in cookies.
fn cors_layer(trusted_origins: &[String]) -> CorsLayer {
    if trusted_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = trusted_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(target: "movies.routes", origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECONDS))
}
