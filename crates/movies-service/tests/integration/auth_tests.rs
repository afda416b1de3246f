//! E2E tests for the authentication middleware and authorization gates.
//!
//! Every rejection is checked for status, error code and the
//! `WWW-Authenticate` challenge where applicable.

use movies_service::models::PermissionCode;
use movies_test_utils::{authentication_token, create_user, reader_token, TestMoviesServer};
use reqwest::{header, StatusCode};
use serde_json::json;
use sqlx::PgPool;

const WELL_FORMED_UNKNOWN_TOKEN: &str = "ZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZZ";

async fn error_code(response: reqwest::Response) -> Result<String, anyhow::Error> {
    let body: serde_json::Value = response.json().await?;
    Ok(body["error"]["code"].as_str().unwrap_or_default().to_string())
}

// ============================================================================
// Authentication
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_anonymous_request_to_gated_route_requires_authentication(
    pool: PgPool,
) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = server
        .client()
        .get(format!("{}/v1/movies/1", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
    assert_eq!(error_code(response).await?, "AUTHENTICATION_REQUIRED");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_malformed_header_is_rejected_even_on_public_route(
    pool: PgPool,
) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
        "Bearer"
    );
    assert_eq!(response.headers().get(header::VARY).unwrap(), "Authorization");
    assert_eq!(error_code(response).await?, "INVALID_AUTHENTICATION_TOKEN");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_malformed_and_unknown_tokens_are_indistinguishable(
    pool: PgPool,
) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let malformed = server
        .client()
        .get(format!("{}/v1/movies/1", server.url()))
        .bearer_auth("not-a-token")
        .send()
        .await?;
    let unknown = server
        .client()
        .get(format!("{}/v1/movies/1", server.url()))
        .bearer_auth(WELL_FORMED_UNKNOWN_TOKEN)
        .send()
        .await?;

    assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

    let malformed_body: serde_json::Value = malformed.json().await?;
    let unknown_body: serde_json::Value = unknown.json().await?;
    assert_eq!(malformed_body, unknown_body);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_activation_token_cannot_authenticate(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    server
        .client()
        .post(format!("{}/v1/users", server.url()))
        .json(&json!({"name": "Ann", "email": "ann@example.com", "password": "pa55word1234"}))
        .send()
        .await?;
    server
        .supervisor()
        .quiesce(std::time::Duration::from_secs(5))
        .await;
    let activation_token = server
        .mailer()
        .and_then(|m| m.activation_token_for("ann@example.com"))
        .expect("activation token should have been sent");

    let response = server
        .client()
        .get(format!("{}/v1/users/me", server.url()))
        .bearer_auth(activation_token)
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await?, "INVALID_AUTHENTICATION_TOKEN");

    Ok(())
}

// ============================================================================
// Authorization
// ============================================================================

#[sqlx::test(migrations = "../../migrations")]
async fn test_unactivated_user_is_rejected_before_permission_check(
    pool: PgPool,
) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool.clone()).await?;
    let user = create_user(&pool, "Ann", "ann@example.com", false, &[PermissionCode::MoviesWrite])
        .await?;
    let token = authentication_token(&pool, &user).await?;

    let response = server
        .client()
        .post(format!("{}/v1/movies", server.url()))
        .bearer_auth(&token)
        .json(&json!({"title": "Heat", "year": 1995, "runtime": 170, "genres": ["crime"]}))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(response).await?, "ACCOUNT_NOT_ACTIVATED");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_reader_cannot_write(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool.clone()).await?;
    let token = reader_token(&pool, "reader@example.com").await?;

    let response = server
        .client()
        .post(format!("{}/v1/movies", server.url()))
        .bearer_auth(&token)
        .json(&json!({"title": "Heat", "year": 1995, "runtime": 170, "genres": ["crime"]}))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(response).await?, "FORBIDDEN");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_me_requires_activation(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool.clone()).await?;
    let pending = create_user(&pool, "Ann", "ann@example.com", false, &[]).await?;
    let active = create_user(&pool, "Bob", "bob@example.com", true, &[]).await?;

    let pending_response = server
        .client()
        .get(format!("{}/v1/users/me", server.url()))
        .bearer_auth(authentication_token(&pool, &pending).await?)
        .send()
        .await?;
    assert_eq!(pending_response.status(), StatusCode::FORBIDDEN);

    let active_response = server
        .client()
        .get(format!("{}/v1/users/me", server.url()))
        .bearer_auth(authentication_token(&pool, &active).await?)
        .send()
        .await?;
    assert_eq!(active_response.status(), StatusCode::OK);
    assert_eq!(active_response.headers().get(header::VARY).unwrap(), "Authorization");

    let body: serde_json::Value = active_response.json().await?;
    assert_eq!(body["user"]["email"], "bob@example.com");
    assert!(
        body["user"].get("password_hash").is_none(),
        "Password hash must never be serialized"
    );

    Ok(())
}
