//! Integration tests for per-client rate limiting and CORS.

use movies_test_utils::TestMoviesServer;
use reqwest::StatusCode;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_client_over_burst_gets_429(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn_with_rate_limit(pool, 1, 3).await?;

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let response = server
            .client()
            .get(format!("{}/health", server.url()))
            .send()
            .await?;
        statuses.push(response.status());
    }

    assert_eq!(
        &statuses[..3],
        &[StatusCode::OK, StatusCode::OK, StatusCode::OK]
    );
    assert_eq!(statuses[4], StatusCode::TOO_MANY_REQUESTS);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_limited_request_never_reaches_authentication(
    pool: PgPool,
) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn_with_rate_limit(pool, 1, 1).await?;
    let bad_token = format!("Bearer {}", "A".repeat(43));

    let first = server
        .client()
        .get(format!("{}/v1/movies/1", server.url()))
        .header("Authorization", &bad_token)
        .send()
        .await?;
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

    let limited = server
        .client()
        .get(format!("{}/v1/movies/1", server.url()))
        .header("Authorization", &bad_token)
        .send()
        .await?;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.headers()["Retry-After"], "1");
    assert!(limited.headers().get("WWW-Authenticate").is_none());

    let body: serde_json::Value = limited.json().await?;
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_cors_preflight_is_answered(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = server
        .client()
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/v1/movies", server.url()),
        )
        .header("Origin", "https://ui.example")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "authorization, content-type")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");

    Ok(())
}
