//! Movie handlers.
//!
//! - `POST /v1/movies` - create (`movies:write`)
//! - `GET /v1/movies/{id}` - show (`movies:read`)
//! - `PATCH /v1/movies/{id}` - partial update at a known version (`movies:write`)
//! - `DELETE /v1/movies/{id}?version=N` - delete at a known version (`movies:write`)
//!
//! Gates run as route layers before these handlers. Updates and deletes go
//! through the conditional-write primitive, so a stale version is a 409.

use crate::errors::ApiError;
use crate::handlers::json_body;
use crate::models::{
    CreateMovieRequest, DeleteMovieQuery, MessageResponse, Movie, MovieResponse,
    UpdateMovieRequest,
};
use crate::repositories::{conditional_delete, conditional_update, movies};
use crate::routes::AppState;
use crate::validation::{self, Validator};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Parse a movie id path segment. Anything that is not a positive integer
/// cannot name a movie.
fn parse_movie_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::NotFound("movie".to_string())),
    }
}

/// Handler for POST /v1/movies
#[instrument(skip_all, name = "movies.handler.create_movie")]
pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateMovieRequest>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<MovieResponse>), ApiError> {
    let request = json_body(payload)?;
    let title = request.title.trim().to_string();

    let mut v = Validator::new();
    validation::validate_movie(&mut v, &title, request.year, request.runtime, &request.genres);
    v.finish()?;

    let store = &state.store;
    let movie = store
        .run(
            "movies.insert",
            movies::insert(
                store.pool(),
                &title,
                request.year,
                request.runtime,
                &request.genres,
            ),
        )
        .await?;

    info!(target: "movies.handler", movie_id = movie.id, "Movie created");

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id))
        .map_err(|_| ApiError::Internal)?;
    headers.insert(header::LOCATION, location);

    Ok((
        StatusCode::CREATED,
        headers,
        Json(MovieResponse {
            message: "movie created".to_string(),
            movie,
        }),
    ))
}

async fn load_movie(state: &AppState, id: i64) -> Result<Movie, ApiError> {
    let store = &state.store;
    store
        .run("movies.get", movies::get(store.pool(), id))
        .await?
        .ok_or_else(|| ApiError::NotFound("movie".to_string()))
}

/// Handler for GET /v1/movies/{id}
#[instrument(skip_all, name = "movies.handler.show_movie")]
pub async fn show_movie(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Json<MovieResponse>, ApiError> {
    let id = parse_movie_id(&raw_id)?;
    let movie = load_movie(&state, id).await?;

    Ok(Json(MovieResponse {
        message: "movie retrieved".to_string(),
        movie,
    }))
}

/// Handler for PATCH /v1/movies/{id}
///
/// Absent fields keep their stored value. The request's `version` is the one
/// the caller last read; if another write landed since, this returns 409.
#[instrument(skip_all, name = "movies.handler.update_movie")]
pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    payload: Result<Json<UpdateMovieRequest>, JsonRejection>,
) -> Result<Json<MovieResponse>, ApiError> {
    let id = parse_movie_id(&raw_id)?;
    let request = json_body(payload)?;

    let mut movie = load_movie(&state, id).await?;

    if let Some(title) = request.title {
        movie.title = title.trim().to_string();
    }
    if let Some(year) = request.year {
        movie.year = year;
    }
    if let Some(runtime) = request.runtime {
        movie.runtime = runtime;
    }
    if let Some(genres) = request.genres {
        movie.genres = genres;
    }

    let mut v = Validator::new();
    validation::validate_movie(&mut v, &movie.title, movie.year, movie.runtime, &movie.genres);
    v.finish()?;

    movie.version = request.version;

    let store = &state.store;
    store
        .run("movies.update", conditional_update(store.pool(), &mut movie))
        .await?;

    info!(
        target: "movies.handler",
        movie_id = movie.id,
        version = movie.version,
        "Movie updated"
    );

    Ok(Json(MovieResponse {
        message: "movie updated".to_string(),
        movie,
    }))
}

/// Handler for DELETE /v1/movies/{id}?version=N
#[instrument(skip_all, name = "movies.handler.delete_movie")]
pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    query: Result<Query<DeleteMovieQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_movie_id(&raw_id)?;
    let Query(query) = query.map_err(|_| {
        ApiError::BadRequest("the version query parameter must be an integer".to_string())
    })?;

    let store = &state.store;
    store
        .run(
            "movies.delete",
            conditional_delete::<Movie>(store.pool(), id, query.version),
        )
        .await?;

    info!(target: "movies.handler", movie_id = id, "Movie deleted");

    Ok(Json(MessageResponse {
        message: "movie successfully deleted".to_string(),
    }))
}
