//! Permission grant repository.

use crate::errors::ApiError;
use crate::models::{PermissionCode, Permissions};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// All permission codes granted to `user_id`.
pub async fn all_for_user(pool: &PgPool, user_id: Uuid) -> Result<Permissions, ApiError> {
    let codes: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT permissions.code
        FROM permissions
        INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
        WHERE users_permissions.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to fetch permissions: {}", e)))?;

    Ok(codes.into_iter().collect())
}

/// Grant `codes` to `user_id`. Already-held codes are ignored.
pub async fn grant<'e, E>(
    executor: E,
    user_id: Uuid,
    codes: &[PermissionCode],
) -> Result<(), ApiError>
where
    E: PgExecutor<'e>,
{
    let codes: Vec<String> = codes.iter().map(|c| c.as_str().to_string()).collect();

    sqlx::query(
        r#"
        INSERT INTO users_permissions (user_id, permission_id)
        SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(codes)
    .execute(executor)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to grant permissions: {}", e)))?;

    Ok(())
}

/// Seed the default grant set for a newly registered user.
pub async fn grant_defaults<'e, E>(executor: E, user_id: Uuid) -> Result<(), ApiError>
where
    E: PgExecutor<'e>,
{
    grant(executor, user_id, PermissionCode::defaults()).await
}
