//! Movie repository.

use crate::errors::ApiError;
use crate::models::Movie;
use crate::repositories::versioned::Versioned;
use sqlx::query_builder::Separated;
use sqlx::{PgPool, Postgres};

impl Versioned for Movie {
    const TABLE: &'static str = "movies";
    const KEY_COLUMN: &'static str = "id";
    const RESOURCE: &'static str = "movie";

    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn push_assignments(&self, set: &mut Separated<'_, '_, Postgres, &'static str>) {
        set.push("title = ").push_bind_unseparated(self.title.clone());
        set.push("year = ").push_bind_unseparated(self.year);
        set.push("runtime = ").push_bind_unseparated(self.runtime);
        set.push("genres = ").push_bind_unseparated(self.genres.clone());
    }
}

pub async fn insert(
    pool: &PgPool,
    title: &str,
    year: i32,
    runtime: i32,
    genres: &[String],
) -> Result<Movie, ApiError> {
    sqlx::query_as::<_, Movie>(
        r#"
        INSERT INTO movies (title, year, runtime, genres)
        VALUES ($1, $2, $3, $4)
        RETURNING id, created_at, title, year, runtime, genres, version
        "#,
    )
    .bind(title)
    .bind(year)
    .bind(runtime)
    .bind(genres)
    .fetch_one(pool)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to create movie: {}", e)))
}

pub async fn get(pool: &PgPool, id: i64) -> Result<Option<Movie>, ApiError> {
    sqlx::query_as::<_, Movie>(
        r#"
        SELECT id, created_at, title, year, runtime, genres, version
        FROM movies
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to fetch movie: {}", e)))
}
