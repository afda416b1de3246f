//! Token repository. Stores digests only.

use crate::errors::ApiError;
use crate::models::{TokenScope, User};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

pub async fn insert<'e, E>(
    executor: E,
    digest: &[u8],
    user_id: Uuid,
    scope: TokenScope,
    expiry: DateTime<Utc>,
) -> Result<(), ApiError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO tokens (hash, user_id, expiry, scope)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(digest)
    .bind(user_id)
    .bind(expiry)
    .bind(scope.as_str())
    .execute(executor)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to insert token: {}", e)))?;

    Ok(())
}

/// Owner of the live token with this digest and scope, if any.
///
/// Expired tokens and tokens of another scope are treated as absent.
pub async fn find_user(
    pool: &PgPool,
    scope: TokenScope,
    digest: &[u8],
    now: DateTime<Utc>,
) -> Result<Option<User>, ApiError> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT users.id, users.created_at, users.name, users.email,
               users.password_hash, users.activated, users.version
        FROM users
        INNER JOIN tokens ON users.id = tokens.user_id
        WHERE tokens.hash = $1
          AND tokens.scope = $2
          AND tokens.expiry > $3
        "#,
    )
    .bind(digest)
    .bind(scope.as_str())
    .bind(now)
    .fetch_optional(pool)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to look up token: {}", e)))
}

/// Delete every token of `scope` owned by `user_id`. Returns the count.
pub async fn delete_all_for_user<'e, E>(
    executor: E,
    scope: TokenScope,
    user_id: Uuid,
) -> Result<u64, ApiError>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        DELETE FROM tokens
        WHERE scope = $1 AND user_id = $2
        "#,
    )
    .bind(scope.as_str())
    .bind(user_id)
    .execute(executor)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to delete tokens: {}", e)))?;

    Ok(result.rows_affected())
}

/// Delete every token that expired at or before `now`. Returns the count.
pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, ApiError> {
    let result = sqlx::query(
        r#"
        DELETE FROM tokens
        WHERE expiry <= $1
        "#,
    )
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to purge expired tokens: {}", e)))?;

    Ok(result.rows_affected())
}
