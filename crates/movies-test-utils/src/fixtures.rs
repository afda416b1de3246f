//! Database fixtures.
//!
//! Seed users, grants and tokens without going through HTTP, so tests can
//! start from a known state (for example an activated user with
//! `movies:write`) in one call.

use movies_service::crypto;
use movies_service::models::{PermissionCode, TokenScope, User};
use movies_service::repositories::{conditional_update, permissions, users, Store};
use movies_service::services::token_service;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use std::time::Duration;

/// Password used by every fixture user.
pub const TEST_PASSWORD: &str = "pa55word-for-tests";

fn store(pool: &PgPool) -> Store {
    Store::new(pool.clone(), Duration::from_secs(5))
}

/// Seed a user with the default grants plus `extra`.
pub async fn create_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    activated: bool,
    extra: &[PermissionCode],
) -> Result<User, anyhow::Error> {
    let hash = crypto::hash_password(
        &SecretString::from(TEST_PASSWORD.to_string()),
        movies_service::config::MIN_BCRYPT_COST,
    )?;

    let mut user = users::insert(pool, name, email, &hash).await?;
    permissions::grant_defaults(pool, user.id).await?;
    permissions::grant(pool, user.id, extra).await?;

    if activated {
        user.activated = true;
        conditional_update(pool, &mut user).await?;
    }

    Ok(user)
}

/// Issue an authentication token for `user` and return its plaintext.
pub async fn authentication_token(pool: &PgPool, user: &User) -> Result<String, anyhow::Error> {
    let token = token_service::issue(
        &store(pool),
        user.id,
        token_service::authentication_ttl(),
        TokenScope::Authentication,
    )
    .await?;
    Ok(token.plaintext.expose_secret().to_string())
}

/// Seed an activated user holding `movies:write` and return a bearer token.
pub async fn writer_token(pool: &PgPool, email: &str) -> Result<String, anyhow::Error> {
    let user = create_user(pool, "Writer", email, true, &[PermissionCode::MoviesWrite]).await?;
    authentication_token(pool, &user).await
}

/// Seed an activated user with only the default grants and return a bearer token.
pub async fn reader_token(pool: &PgPool, email: &str) -> Result<String, anyhow::Error> {
    let user = create_user(pool, "Reader", email, true, &[]).await?;
    authentication_token(pool, &user).await
}
