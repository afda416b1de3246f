//! E2E tests for the movie endpoints and optimistic concurrency.

use movies_test_utils::{writer_token, TestMoviesServer};
use reqwest::{header, StatusCode};
use serde_json::json;
use sqlx::PgPool;

struct Session {
    server: TestMoviesServer,
    token: String,
}

impl Session {
    async fn start(pool: PgPool) -> Result<Self, anyhow::Error> {
        let token = writer_token(&pool, "writer@example.com").await?;
        let server = TestMoviesServer::spawn(pool).await?;
        Ok(Self { server, token })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server.url(), path)
    }

    async fn create(&self, body: serde_json::Value) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .server
            .client()
            .post(self.url("/v1/movies"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?)
    }

    async fn create_heat(&self) -> Result<i64, anyhow::Error> {
        let body: serde_json::Value = self
            .create(json!({"title": "Heat", "year": 1995, "runtime": 170, "genres": ["crime", "drama"]}))
            .await?
            .json()
            .await?;
        Ok(body["movie"]["id"].as_i64().unwrap())
    }

    async fn patch(
        &self,
        id: i64,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .server
            .client()
            .patch(self.url(&format!("/v1/movies/{}", id)))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?)
    }

    async fn delete(&self, path: &str) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .server
            .client()
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await?)
    }

    async fn show(&self, id: &str) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .server
            .client()
            .get(self.url(&format!("/v1/movies/{}", id)))
            .bearer_auth(&self.token)
            .send()
            .await?)
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_movie_sets_location(pool: PgPool) -> Result<(), anyhow::Error> {
    let session = Session::start(pool).await?;

    let response = session
        .create(json!({"title": "Heat", "year": 1995, "runtime": 170, "genres": ["crime"]}))
        .await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()?
        .to_string();
    let body: serde_json::Value = response.json().await?;
    assert_eq!(location, format!("/v1/movies/{}", body["movie"]["id"]));
    assert_eq!(body["movie"]["version"], 1);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_create_movie_invalid_fields(pool: PgPool) -> Result<(), anyhow::Error> {
    let session = Session::start(pool).await?;

    let response = session
        .create(json!({"title": "", "year": 1700, "runtime": -5, "genres": []}))
        .await?;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json().await?;
    let fields = &body["error"]["fields"];
    for field in ["title", "year", "runtime", "genres"] {
        assert!(fields.get(field).is_some(), "{} should be reported", field);
    }

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_show_movie(pool: PgPool) -> Result<(), anyhow::Error> {
    let session = Session::start(pool).await?;
    let id = session.create_heat().await?;

    let response = session.show(&id.to_string()).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["movie"]["title"], "Heat");
    assert_eq!(body["movie"]["genres"], json!(["crime", "drama"]));

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_show_movie_bad_ids_are_not_found(pool: PgPool) -> Result<(), anyhow::Error> {
    let session = Session::start(pool).await?;

    for id in ["0", "-1", "abc", "999999"] {
        let response = session.show(id).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "id {:?}", id);
    }

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_movie_merges_and_bumps_version(pool: PgPool) -> Result<(), anyhow::Error> {
    let session = Session::start(pool).await?;
    let id = session.create_heat().await?;

    let response = session.patch(id, json!({"version": 1, "runtime": 171})).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["movie"]["runtime"], 171);
    assert_eq!(body["movie"]["title"], "Heat");
    assert_eq!(body["movie"]["version"], 2);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_movie_stale_version_conflicts(pool: PgPool) -> Result<(), anyhow::Error> {
    let session = Session::start(pool).await?;
    let id = session.create_heat().await?;

    let first = session.patch(id, json!({"version": 1, "title": "Heat (1995)"})).await?;
    assert_eq!(first.status(), StatusCode::OK);

    let second = session.patch(id, json!({"version": 1, "runtime": 100})).await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = second.json().await?;
    assert_eq!(body["error"]["code"], "EDIT_CONFLICT");

    // The losing write left no trace
    let current: serde_json::Value = session.show(&id.to_string()).await?.json().await?;
    assert_eq!(current["movie"]["runtime"], 170);
    assert_eq!(current["movie"]["version"], 2);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_update_movie_requires_version(pool: PgPool) -> Result<(), anyhow::Error> {
    let session = Session::start(pool).await?;
    let id = session.create_heat().await?;

    let response = session.patch(id, json!({"runtime": 171})).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_concurrent_updates_one_wins(pool: PgPool) -> Result<(), anyhow::Error> {
    let session = Session::start(pool).await?;
    let id = session.create_heat().await?;

    let (a, b) = tokio::join!(
        session.patch(id, json!({"version": 1, "runtime": 101})),
        session.patch(id, json!({"version": 1, "runtime": 102})),
    );
    let mut statuses = vec![a?.status(), b?.status()];
    statuses.sort();

    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_movie_at_version(pool: PgPool) -> Result<(), anyhow::Error> {
    let session = Session::start(pool).await?;
    let id = session.create_heat().await?;

    let stale = session.delete(&format!("/v1/movies/{}?version=7", id)).await?;
    assert_eq!(stale.status(), StatusCode::CONFLICT);

    let missing_version = session.delete(&format!("/v1/movies/{}", id)).await?;
    assert_eq!(missing_version.status(), StatusCode::BAD_REQUEST);

    let deleted = session.delete(&format!("/v1/movies/{}?version=1", id)).await?;
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = session.delete(&format!("/v1/movies/{}?version=1", id)).await?;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    Ok(())
}
