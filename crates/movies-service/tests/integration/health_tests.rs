//! Integration tests for the operational endpoints.

use movies_test_utils::TestMoviesServer;
use reqwest::StatusCode;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_health_endpoint_returns_ok(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = server
        .client()
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_ready_endpoint_reports_healthy_database(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = server
        .client()
        .get(format!("{}/ready", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["database"], "healthy");
    assert!(body["error"].is_null(), "Error field should not be present");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_ready_endpoint_reports_closed_pool(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool.clone()).await?;
    pool.close().await;

    let response = server
        .client()
        .get(format!("{}/ready", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["error"], "Service dependencies unavailable");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_metrics_endpoint_serves_text(pool: PgPool) -> Result<(), anyhow::Error> {
    let server = TestMoviesServer::spawn(pool).await?;

    let response = server
        .client()
        .get(format!("{}/metrics", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}
