//! Request validation.
//!
//! A [`Validator`] collects field-level errors; the first failure recorded for
//! a field wins. An invalid validator converts into `ApiError::Validation`,
//! which renders as a 422 with a field→message map.

use crate::crypto::is_token_shaped;
use crate::errors::ApiError;
use chrono::{Datelike, Utc};
use std::collections::{BTreeMap, HashSet};

/// Field name → human readable message.
pub type FieldErrors = BTreeMap<String, String>;

/// Earliest accepted movie release year.
pub const MIN_MOVIE_YEAR: i32 = 1888;

/// Upper bound on name and title length, in characters.
pub const MAX_TEXT_LEN: usize = 500;

/// Password length bounds in bytes. bcrypt ignores anything past 72 bytes.
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 72;

pub const MAX_GENRES: usize = 5;

#[derive(Debug, Default)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record an error for `field` unless one is already present.
    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_insert_with(|| message.to_string());
    }

    /// Record `message` for `field` when `ok` is false.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    /// `Ok(())` when no errors were recorded, otherwise the 422 error.
    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }
}

/// Minimal structural email check: one `@`, non-empty local part, and a
/// dotted domain without whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(is_valid_email(email), "email", "must be a valid email address");
}

pub fn validate_password(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= MIN_PASSWORD_LEN,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= MAX_PASSWORD_LEN,
        "password",
        "must not be more than 72 bytes long",
    );
}

pub fn validate_user(v: &mut Validator, name: &str, email: &str, password: &str) {
    v.check(!name.trim().is_empty(), "name", "must be provided");
    v.check(
        name.chars().count() <= MAX_TEXT_LEN,
        "name",
        "must not be more than 500 characters long",
    );
    validate_email(v, email);
    validate_password(v, password);
}

pub fn validate_token_plaintext(v: &mut Validator, token: &str) {
    v.check(!token.is_empty(), "token", "must be provided");
    v.check(is_token_shaped(token), "token", "must be a well-formed token");
}

pub fn validate_movie(v: &mut Validator, title: &str, year: i32, runtime: i32, genres: &[String]) {
    v.check(!title.trim().is_empty(), "title", "must be provided");
    v.check(
        title.chars().count() <= MAX_TEXT_LEN,
        "title",
        "must not be more than 500 characters long",
    );

    v.check(year != 0, "year", "must be provided");
    v.check(year >= MIN_MOVIE_YEAR, "year", "must not be earlier than 1888");
    v.check(year <= Utc::now().year(), "year", "must not be in the future");

    v.check(runtime != 0, "runtime", "must be provided");
    v.check(runtime > 0, "runtime", "must be a positive integer");

    v.check(!genres.is_empty(), "genres", "must contain at least 1 genre");
    v.check(
        genres.len() <= MAX_GENRES,
        "genres",
        "must not contain more than 5 genres",
    );
    v.check(
        genres.iter().all(|g| !g.trim().is_empty()),
        "genres",
        "must not contain empty values",
    );
    let unique: HashSet<&String> = genres.iter().collect();
    v.check(
        unique.len() == genres.len(),
        "genres",
        "must not contain duplicate values",
    );
}
