//! Argon2 password hashing.
//!
//! Hashing is CPU bound, so the async wrappers move it onto tokio's
//! blocking pool.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;

use crate::errors::ServiceError;

/// Hash verified when a login names an unknown email, so both failure
/// paths cost one argon2 verification.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("storefront-dummy-password").ok());

/// Hashes `password` into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(format!("failed to hash password: {}", e)))
}

/// Returns `Ok(false)` on mismatch and an error only for a malformed hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| ServiceError::HashError(format!("invalid password hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ServiceError::HashError(format!("verify error: {}", e))),
    }
}

pub async fn hash_password_blocking(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::InternalError(format!("hashing task failed: {}", e)))?
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::InternalError(format!("verify task failed: {}", e)))?
}

/// Burns one verification against the dummy hash. Always reports no match.
pub async fn verify_dummy(password: String) -> Result<bool, ServiceError> {
    if let Some(hash) = DUMMY_HASH.as_ref() {
        verify_password_blocking(password, hash.clone()).await?;
    }
    Ok(false)
}
