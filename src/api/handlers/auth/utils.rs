//! Credential hashing, token generation, and input validation helpers.

use anyhow::{Context, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Usernames are lookup keys, not display names.
pub(crate) fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{2,63}$").is_ok_and(|re| re.is_match(username))
}

/// Argon2id-hash a login password or recovery secret.
///
/// # Errors
/// Returns an error if hashing fails.
pub(crate) fn hash_secret(raw: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("failed to hash secret: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a secret against its stored Argon2 hash.
///
/// The verifier runs the full hash, so comparison cost does not depend on
/// where the inputs differ.
///
/// # Errors
/// Returns an error when the stored hash is not a valid PHC string.
pub(crate) fn verify_secret(raw: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| anyhow::anyhow!("invalid stored hash: {err}"))?;
    Ok(Argon2::default()
        .verify_password(raw.as_bytes(), &parsed)
        .is_ok())
}

/// Create a session token (access or refresh).
/// The raw value is only returned to the client; the database stores a hash.
///
/// # Errors
/// Returns an error if the OS RNG fails.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch the database.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Random per-user key-derivation salt, stored and served as lowercase hex.
///
/// # Errors
/// Returns an error if the OS RNG fails.
pub(crate) fn generate_derivation_salt() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate key-derivation salt")?;
    Ok(hex::encode(bytes))
}
