//! Credential hashing and opaque token primitives.
//!
//! Two distinct one-way functions live here:
//! - bcrypt (slow, salted) for user passwords
//! - SHA-256 (fast) for high-entropy token plaintexts
//!
//! Plaintext secrets never leave this module except wrapped in `SecretString`.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::ApiError;
use base64::{engine::general_purpose, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::instrument;

/// Number of random bytes in a token plaintext.
pub const TOKEN_ENTROPY_BYTES: usize = 32;

/// Length of an encoded token plaintext (32 bytes, base64url without padding).
pub const TOKEN_PLAINTEXT_LEN: usize = 43;

/// Pre-computed bcrypt hash (cost 12) verified against when a login names an
/// unknown email, so response time does not reveal whether the account exists.
pub const DUMMY_PASSWORD_HASH: &str =
    "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Hash a password with bcrypt at the given cost.
///
/// Fails with `HashingFailure` if the cost is outside the accepted range or
/// the underlying primitive fails.
#[instrument(skip_all)]
pub fn hash_password(password: &SecretString, cost: u32) -> Result<String, ApiError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(ApiError::HashingFailure(format!(
            "Invalid bcrypt cost: {} (must be {}-{})",
            cost, MIN_BCRYPT_COST, MAX_BCRYPT_COST
        )));
    }

    bcrypt::hash(password.expose_secret(), cost)
        .map_err(|e| ApiError::HashingFailure(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a bcrypt hash.
///
/// A mismatch is `Ok(false)`. Only a malformed hash is an error.
#[instrument(skip_all)]
pub fn verify_password(password: &SecretString, hash: &str) -> Result<bool, ApiError> {
    bcrypt::verify(password.expose_secret(), hash)
        .map_err(|e| ApiError::HashingFailure(format!("Password verification failed: {}", e)))
}

/// Generate cryptographically secure random bytes
pub fn generate_random_bytes(len: usize) -> Result<Vec<u8>, ApiError> {
    let rng = SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|e| ApiError::HashingFailure(format!("Random bytes generation failed: {}", e)))?;
    Ok(bytes)
}

/// Generate a token plaintext (32 random bytes, base64url without padding).
#[instrument(skip_all)]
pub fn generate_token_plaintext() -> Result<SecretString, ApiError> {
    let bytes = generate_random_bytes(TOKEN_ENTROPY_BYTES)?;
    let encoded = general_purpose::URL_SAFE_NO_PAD.encode(&bytes);
    Ok(SecretString::from(encoded))
}

/// SHA-256 digest of a token plaintext. This is the only form persisted.
pub fn token_digest(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

/// Whether `candidate` has the shape of a token produced by
/// [`generate_token_plaintext`].
pub fn is_token_shaped(candidate: &str) -> bool {
    candidate.len() == TOKEN_PLAINTEXT_LEN
        && candidate
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
