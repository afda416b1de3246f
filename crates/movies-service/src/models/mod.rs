//! Domain models and request/response bodies.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Users and identity
// ============================================================================

/// User record (maps to users table). The password hash is never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub activated: bool,
    pub version: i32,
}

/// Who is making the current request.
///
/// Populated exactly once per request by the authentication middleware.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }
}

// ============================================================================
// Tokens
// ============================================================================

/// Purpose a token is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    Activation,
    Authentication,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly issued token. The plaintext exists only here and is handed to
/// the caller once; storage holds the digest.
#[derive(Debug)]
pub struct IssuedToken {
    pub plaintext: SecretString,
    pub user_id: Uuid,
    pub scope: TokenScope,
    pub expiry: DateTime<Utc>,
}

// ============================================================================
// Permissions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionCode {
    MoviesRead,
    MoviesWrite,
}

impl PermissionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionCode::MoviesRead => "movies:read",
            PermissionCode::MoviesWrite => "movies:write",
        }
    }

    /// Granted to every new user at registration.
    pub fn defaults() -> &'static [PermissionCode] {
        &[PermissionCode::MoviesRead]
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of permission codes held by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(BTreeSet<String>);

impl Permissions {
    pub fn includes(&self, code: &str) -> bool {
        self.0.contains(code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for Permissions {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Permissions(iter.into_iter().collect())
    }
}

// ============================================================================
// Movies
// ============================================================================

/// Movie record (maps to movies table).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Movie {
    pub id: i64,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub year: i32,
    pub runtime: i32,
    pub genres: Vec<String>,
    pub version: i32,
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct ActivateUserRequest {
    pub token: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    pub title: String,
    pub year: i32,
    pub runtime: i32,
    pub genres: Vec<String>,
}

/// Partial update. `version` is the version the caller last read.
#[derive(Debug, Deserialize)]
pub struct UpdateMovieRequest {
    pub version: i32,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<i32>,
    pub genres: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMovieQuery {
    pub version: i32,
}

// ============================================================================
// Response bodies
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct AuthenticationTokenBody {
    pub token: String,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AuthenticationResponse {
    pub message: String,
    pub authentication_token: AuthenticationTokenBody,
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub message: String,
    pub movie: Movie,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Readiness check body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
