// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential policy and Argon2id hashing.
//!
//! Hashing and verification are CPU-bound, so callers in async code run
//! them through [`hash_credential_blocking`] / `spawn_blocking`.

use crate::error::AppError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

/// Minimum-strength rules for new credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialPolicy {
    pub min_length: usize,
}

impl CredentialPolicy {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn check(&self, credential: &str) -> Result<(), AppError> {
        if credential.is_empty() {
            return Err(AppError::Validation("Password is required".to_string()));
        }
        if credential.chars().count() < self.min_length {
            return Err(AppError::Validation(format!(
                "Password must be at least {} characters long",
                self.min_length
            )));
        }
        Ok(())
    }
}

impl Default for CredentialPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MIN_PASSWORD_LENGTH)
    }
}

/// Hash a credential into a PHC string with a fresh random salt.
pub fn hash_credential(credential: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(credential.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Credential hashing failed: {}", e)))
}

/// Check a credential against a stored PHC string.
///
/// Malformed stored hashes never match.
pub fn verify_credential(credential: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(credential.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored credential hash is malformed");
            false
        }
    }
}

/// Argon2id hash with default parameters that no credential matches.
const UNMATCHABLE_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Spend one full verification on a credential that has no stored hash
/// to check against, so an unknown account takes as long as a wrong
/// password.
pub fn verify_without_account(credential: &str) {
    let _ = verify_credential(credential, UNMATCHABLE_HASH);
}

/// [`hash_credential`] on the blocking thread pool.
pub async fn hash_credential_blocking(credential: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_credential(&credential))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
}
