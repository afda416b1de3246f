//! Token ledger: issue, validate and revoke scoped opaque tokens.
//!
//! The plaintext is generated here, handed back once inside [`IssuedToken`],
//! and never stored. Storage only ever sees its SHA-256 digest.
//!
//! Validation failures are uniform: a wrong token, an expired token and a
//! token of another scope all come back as `ApiError::NotFound("token")`.

use crate::crypto;
use crate::errors::ApiError;
use crate::models::{IssuedToken, TokenScope, User};
use crate::observability::metrics::{
    record_token_issued, record_token_validation, record_tokens_purged,
};
use crate::repositories::{tokens, Store};
use chrono::{Duration, Utc};
use secrecy::ExposeSecret;
use sqlx::PgExecutor;
use tracing::instrument;
use uuid::Uuid;

/// Lifetime of an activation token (2 days).
pub const ACTIVATION_TOKEN_TTL_HOURS: i64 = 48;

/// Lifetime of an authentication token (24 hours).
pub const AUTHENTICATION_TOKEN_TTL_HOURS: i64 = 24;

pub fn activation_ttl() -> Duration {
    Duration::hours(ACTIVATION_TOKEN_TTL_HOURS)
}

pub fn authentication_ttl() -> Duration {
    Duration::hours(AUTHENTICATION_TOKEN_TTL_HOURS)
}

/// Issue a new token for `user_id`.
pub async fn issue(
    store: &Store,
    user_id: Uuid,
    ttl: Duration,
    scope: TokenScope,
) -> Result<IssuedToken, ApiError> {
    store
        .run(
            "tokens.insert",
            issue_with(store.pool(), user_id, ttl, scope),
        )
        .await
}

/// Issue a new token on `executor`.
///
/// Inside a transaction the token only becomes valid once the caller
/// commits.
#[instrument(skip_all, name = "movies.token.issue", fields(scope = %scope))]
pub async fn issue_with<'e, E>(
    executor: E,
    user_id: Uuid,
    ttl: Duration,
    scope: TokenScope,
) -> Result<IssuedToken, ApiError>
where
    E: PgExecutor<'e>,
{
    let plaintext = crypto::generate_token_plaintext()?;
    let digest = crypto::token_digest(plaintext.expose_secret());
    let expiry = Utc::now() + ttl;

    tokens::insert(executor, &digest, user_id, scope, expiry).await?;

    record_token_issued(scope.as_str());

    Ok(IssuedToken {
        plaintext,
        user_id,
        scope,
        expiry,
    })
}

/// Resolve a token plaintext to its owner.
#[instrument(skip_all, name = "movies.token.validate", fields(scope = %scope))]
pub async fn validate(store: &Store, scope: TokenScope, plaintext: &str) -> Result<User, ApiError> {
    let digest = crypto::token_digest(plaintext);

    let result = store
        .run(
            "tokens.find_user",
            tokens::find_user(store.pool(), scope, &digest, Utc::now()),
        )
        .await;

    match result {
        Ok(Some(user)) => {
            record_token_validation(scope.as_str(), "valid");
            Ok(user)
        }
        Ok(None) => {
            record_token_validation(scope.as_str(), "not_found");
            Err(ApiError::NotFound("token".to_string()))
        }
        Err(e) => {
            record_token_validation(scope.as_str(), "error");
            Err(e)
        }
    }
}

/// Delete every `scope` token owned by `user_id`.
#[instrument(skip_all, name = "movies.token.revoke_all", fields(scope = %scope))]
pub async fn revoke_all_for_user(
    store: &Store,
    scope: TokenScope,
    user_id: Uuid,
) -> Result<u64, ApiError> {
    store
        .run(
            "tokens.delete_all_for_user",
            tokens::delete_all_for_user(store.pool(), scope, user_id),
        )
        .await
}

/// Delete every expired token, whatever its scope.
#[instrument(skip_all, name = "movies.token.purge_expired")]
pub async fn purge_expired(store: &Store) -> Result<u64, ApiError> {
    let purged = store
        .run(
            "tokens.delete_expired",
            tokens::delete_expired(store.pool(), Utc::now()),
        )
        .await?;

    record_tokens_purged(purged);
    Ok(purged)
}
