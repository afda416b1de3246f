//! User registration, activation and login.

use crate::crypto;
use crate::errors::ApiError;
use crate::models::{IssuedToken, RegisterUserRequest, TokenScope, User};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_credential_operation;
use crate::repositories::{commit, conditional_update, permissions, tokens, users, Store};
use crate::services::mailer::Mailer;
use crate::services::token_service;
use crate::tasks::TaskSupervisor;
use crate::validation::{self, Validator};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

pub const INVALID_ACTIVATION_TOKEN_MESSAGE: &str = "invalid or expired activation token";

/// Emails are compared and stored trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Register a new, unactivated user.
///
/// The user row, the default grants and the activation token are written in
/// one transaction, so a failure at any step leaves no trace and the email
/// stays free. The activation token is handed to the mailer on the
/// background supervisor only after the commit.
#[instrument(skip_all, name = "movies.user.register")]
pub async fn register(
    store: &Store,
    supervisor: &TaskSupervisor,
    mailer: Arc<dyn Mailer>,
    bcrypt_cost: u32,
    request: RegisterUserRequest,
) -> Result<User, ApiError> {
    let email = normalize_email(&request.email);
    let name = request.name.trim().to_string();

    let mut v = Validator::new();
    validation::validate_user(&mut v, &name, &email, request.password.expose_secret());
    v.finish()?;

    let password_hash = hash_password(request.password, bcrypt_cost).await?;

    let (user, token) = store
        .run("users.register", async {
            let mut tx = store.begin().await?;
            let user = users::insert(&mut *tx, &name, &email, &password_hash).await?;
            permissions::grant_defaults(&mut *tx, user.id).await?;
            let token = token_service::issue_with(
                &mut *tx,
                user.id,
                token_service::activation_ttl(),
                TokenScope::Activation,
            )
            .await?;
            commit(tx).await?;
            Ok::<_, ApiError>((user, token))
        })
        .await?;

    let recipient = user.email.clone();
    let recipient_name = user.name.clone();
    supervisor.submit("send_activation_email", async move {
        mailer
            .send_activation(&recipient, &recipient_name, &token.plaintext)
            .await?;
        anyhow::Ok(())
    });

    info!(
        target: "movies.user",
        user_id = %user.id,
        email_hash = %hash_for_correlation(&user.email),
        "User registered"
    );

    Ok(user)
}

/// Activate the owner of an activation token and revoke all of their
/// activation tokens.
///
/// The activation flag and the revocation commit together. If either fails
/// the user stays unactivated and the tokens stay live for a retry.
#[instrument(skip_all, name = "movies.user.activate")]
pub async fn activate(store: &Store, token: &SecretString) -> Result<User, ApiError> {
    let mut v = Validator::new();
    validation::validate_token_plaintext(&mut v, token.expose_secret());
    v.finish()?;

    let mut user =
        match token_service::validate(store, TokenScope::Activation, token.expose_secret()).await
        {
            Ok(user) => user,
            Err(ApiError::NotFound(_)) => {
                return Err(ApiError::field("token", INVALID_ACTIVATION_TOKEN_MESSAGE))
            }
            Err(e) => return Err(e),
        };

    user.activated = true;
    let revoked = store
        .run("users.activate", async {
            let mut tx = store.begin().await?;
            conditional_update(&mut *tx, &mut user).await?;
            let revoked =
                tokens::delete_all_for_user(&mut *tx, TokenScope::Activation, user.id).await?;
            commit(tx).await?;
            Ok::<_, ApiError>(revoked)
        })
        .await?;

    info!(
        target: "movies.user",
        user_id = %user.id,
        revoked_tokens = revoked,
        "User activated"
    );

    Ok(user)
}

/// Check an email/password pair and issue an authentication token.
///
/// Activation is not required to log in. Unknown email and wrong password
/// fail identically, and both pay for a bcrypt verify.
#[instrument(skip_all, name = "movies.user.login")]
pub async fn login(
    store: &Store,
    email: &str,
    password: SecretString,
) -> Result<IssuedToken, ApiError> {
    let email = normalize_email(email);

    let mut v = Validator::new();
    validation::validate_email(&mut v, &email);
    validation::validate_password(&mut v, password.expose_secret());
    v.finish()?;

    let user = store
        .run("users.get_by_email", users::get_by_email(store.pool(), &email))
        .await?;

    let hash = match &user {
        Some(user) => user.password_hash.clone(),
        None => crypto::DUMMY_PASSWORD_HASH.to_string(),
    };
    let matched = verify_password(password, hash).await?;

    let user = match user {
        Some(user) if matched => user,
        _ => {
            warn!(
                target: "movies.user",
                email_hash = %hash_for_correlation(&email),
                "Login failed"
            );
            return Err(ApiError::LoginFailed);
        }
    };

    let token = token_service::issue(
        store,
        user.id,
        token_service::authentication_ttl(),
        TokenScope::Authentication,
    )
    .await?;

    info!(target: "movies.user", user_id = %user.id, "User logged in");

    Ok(token)
}

/// bcrypt off the async worker threads.
async fn hash_password(password: SecretString, cost: u32) -> Result<String, ApiError> {
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || crypto::hash_password(&password, cost))
        .await
        .map_err(|e| ApiError::HashingFailure(format!("Hashing task failed: {}", e)))?;
    record_credential_operation("hash", start.elapsed());
    result
}

async fn verify_password(password: SecretString, hash: String) -> Result<bool, ApiError> {
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || crypto::verify_password(&password, &hash))
        .await
        .map_err(|e| ApiError::HashingFailure(format!("Verification task failed: {}", e)))?;
    record_credential_operation("verify", start.elapsed());
    result
}
