//! Observability for the movies API.
//!
//! # Privacy by Default
//!
//! Instrumentation uses `#[instrument(skip_all)]` and explicit field
//! allow-listing:
//! - **SAFE**: scopes, permission codes, resource ids, outcomes
//! - **HASHED**: email addresses (via [`hash_for_correlation`])
//! - **NEVER**: passwords, token plaintexts, token digests, password hashes

pub mod metrics;

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Used for fields like `email` that need correlation across log entries
/// but should not be stored in plaintext.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.iter().take(4).copied().collect::<Vec<u8>>())
}
