//! User repository.

use crate::errors::ApiError;
use crate::models::User;
use crate::repositories::versioned::Versioned;
use sqlx::query_builder::Separated;
use sqlx::{PgExecutor, PgPool, Postgres};
use uuid::Uuid;

/// Name of the unique constraint on `users.email`.
const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

pub const DUPLICATE_EMAIL_MESSAGE: &str = "a user with this email address already exists";

impl Versioned for User {
    const TABLE: &'static str = "users";
    const KEY_COLUMN: &'static str = "id";
    const RESOURCE: &'static str = "user";

    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn push_assignments(&self, set: &mut Separated<'_, '_, Postgres, &'static str>) {
        set.push("name = ").push_bind_unseparated(self.name.clone());
        set.push("email = ").push_bind_unseparated(self.email.clone());
        set.push("password_hash = ")
            .push_bind_unseparated(self.password_hash.clone());
        set.push("activated = ").push_bind_unseparated(self.activated);
    }
}

/// Insert a new, unactivated user.
///
/// Fails with `DuplicateUnique` on `email` if the address is taken.
pub async fn insert<'e, E>(
    executor: E,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, ApiError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (name, email, password_hash, activated)
        VALUES ($1, $2, $3, FALSE)
        RETURNING id, created_at, name, email, password_hash, activated, version
        "#,
    )
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(executor)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.constraint() == Some(EMAIL_UNIQUE_CONSTRAINT) => {
            ApiError::DuplicateUnique {
                field: "email".to_string(),
                message: DUPLICATE_EMAIL_MESSAGE.to_string(),
            }
        }
        _ => ApiError::Database(format!("Failed to create user: {}", e)),
    })
}

pub async fn get_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, ApiError> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, created_at, name, email, password_hash, activated, version
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to fetch user by email: {}", e)))
}

pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, ApiError> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, created_at, name, email, password_hash, activated, version
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| ApiError::Database(format!("Failed to fetch user by id: {}", e)))
}
