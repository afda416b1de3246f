//! E2E tests for registration, activation and login.
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use movies_service::services::mailer::mock::PanickingMailer;
use movies_service::tasks::QuiesceOutcome;
use movies_test_utils::TestMoviesServer;
use reqwest::StatusCode;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

const PASSWORD: &str = "pa55word1234";

async fn register(
    server: &TestMoviesServer,
    name: &str,
    email: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(format!("{}/v1/users", server.url()))
        .json(&json!({"name": name, "email": email, "password": PASSWORD}))
        .send()
        .await?)
}

async fn login(
    server: &TestMoviesServer,
    email: &str,
    password: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(format!("{}/v1/users/authentication", server.url()))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await?)
}

async fn activate(
    server: &TestMoviesServer,
    token: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .put(format!("{}/v1/users/activated", server.url()))
        .json(&json!({"token": token}))
        .send()
        .await?)
}

async fn sent_activation_token(server: &TestMoviesServer, email: &str) -> String {
    server.supervisor().quiesce(Duration::from_secs(5)).await;
    server
        .mailer()
        .and_then(|m| m.activation_token_for(email))
        .expect("activation token should have been sent")
}

// ============================================================================
// Registration
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_register_happy_path_sends_activation(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = register(&server, "Ann", "Ann@Example.com").await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["user"]["email"], "ann@example.com");
    assert_eq!(body["user"]["activated"], false);
    assert!(body["user"].get("password_hash").is_none());

    let token = sent_activation_token(&server, "ann@example.com").await;
    assert_eq!(token.len(), 43);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_register_duplicate_email_is_field_error(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let first = register(&server, "Ann", "ann@example.com").await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = register(&server, "Other Ann", "ANN@example.com").await?;

    assert_eq!(second.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = second.json().await?;
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    assert_eq!(
        body["error"]["fields"]["email"],
        "a user with this email address already exists"
    );

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_register_invalid_input_lists_fields(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = server
        .client()
        .post(format!("{}/v1/users", server.url()))
        .json(&json!({"name": "", "email": "not-an-email", "password": "short"}))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json().await?;
    let fields = &body["error"]["fields"];
    assert!(fields.get("name").is_some());
    assert!(fields.get("email").is_some());
    assert!(fields.get("password").is_some());

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_register_malformed_json_is_bad_request(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = server
        .client()
        .post(format!("{}/v1/users", server.url()))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"name\": ")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_register_survives_panicking_mailer(pool: PgPool) -> Result<(), anyhow::Error> {
    let mailer = Arc::new(PanickingMailer::new());
    let server = TestMoviesServer::spawn_with_mailer(pool, mailer.clone()).await?;

    let response = register(&server, "Ann", "ann@example.com").await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    assert_eq!(
        server.supervisor().quiesce(Duration::from_secs(5)).await,
        QuiesceOutcome::Drained
    );
    assert_eq!(mailer.call_count(), 1);

    // The server keeps serving after the background panic
    let health = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;
    assert_eq!(health.status(), StatusCode::OK);

    Ok(())
}

// ============================================================================
// Activation
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_activate_then_replay_is_rejected(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;
    register(&server, "Ann", "ann@example.com").await?;
    let token = sent_activation_token(&server, "ann@example.com").await;

    let response = activate(&server, &token).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["user"]["activated"], true);
    assert_eq!(body["user"]["version"], 2);

    let replay = activate(&server, &token).await?;
    assert_eq!(replay.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = replay.json().await?;
    assert_eq!(
        body["error"]["fields"]["token"],
        "invalid or expired activation token"
    );

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_activate_malformed_token_is_field_error(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = activate(&server, "short").await?;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json().await?;
    assert!(body["error"]["fields"].get("token").is_some());

    Ok(())
}

// ============================================================================
// Login
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_login_before_activation_then_gated_route_is_not_activated(
    pool: PgPool,
) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;
    register(&server, "Ann", "ann@example.com").await?;

    let response = login(&server, "ann@example.com", PASSWORD).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await?;
    let token = body["authentication_token"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(body["authentication_token"]["expiry"].is_string());

    let gated = server
        .client()
        .get(format!("{}/v1/movies/1", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(gated.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = gated.json().await?;
    assert_eq!(body["error"]["code"], "ACCOUNT_NOT_ACTIVATED");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_login_failures_are_uniform(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;
    register(&server, "Ann", "ann@example.com").await?;

    let wrong_password = login(&server, "ann@example.com", "wrong-password").await?;
    let unknown_email = login(&server, "nobody@example.com", PASSWORD).await?;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

    let wrong_body: serde_json::Value = wrong_password.json().await?;
    let unknown_body: serde_json::Value = unknown_email.json().await?;
    assert_eq!(wrong_body, unknown_body);
    assert_eq!(wrong_body["error"]["code"], "INVALID_CREDENTIALS");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_full_flow_register_activate_login_read(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;
    register(&server, "Ann", "ann@example.com").await?;
    let activation = sent_activation_token(&server, "ann@example.com").await;
    assert_eq!(activate(&server, &activation).await?.status(), StatusCode::OK);

    let body: serde_json::Value = login(&server, "ann@example.com", PASSWORD)
        .await?
        .json()
        .await?;
    let token = body["authentication_token"]["token"]
        .as_str()
        .unwrap()
        .to_string();

    // movies:read is a default grant, so the gate passes and the lookup misses
    let response = server
        .client()
        .get(format!("{}/v1/movies/1", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    Ok(())
}
