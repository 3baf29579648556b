//! Passphrase hashing (argon2id, PHC string format).

use argon2::Argon2;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::RngCore;

use crate::errors::{Result, StoreError};

const SALT_LEN: usize = 16;

/// Hash `passphrase` with a fresh random salt.
///
/// Any failure is reported as unavailable; the raw passphrase is never
/// stored as a fallback.
pub fn hash(passphrase: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| StoreError::unavailable("encoding passphrase salt", e))?;
    let hashed = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| StoreError::unavailable("hashing passphrase", e))?;
    Ok(hashed.to_string())
}

/// Check `passphrase` against a stored PHC hash.
pub fn verify(passphrase: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| StoreError::unavailable("parsing stored passphrase hash", e))?;
    match Argon2::default().verify_password(passphrase.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(StoreError::unavailable("verifying passphrase", e)),
    }
}
