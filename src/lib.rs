//! # Keywarden (Credential Vault)
//!
//! `keywarden` is a server-side credential vault. It handles registration,
//! TOTP-based second-factor enrollment, session issuance, and storage of
//! client-side encrypted vault entries and file attachments.
//!
//! ## Account lifecycle
//!
//! Accounts are only usable once fully enrolled: a registration creates the
//! user, a key-derivation salt, and an unconfirmed TOTP device; the client
//! then confirms the device and sets a recovery secret. A login against an
//! account that never finished enrollment deletes the account so the
//! username can be claimed again.
//!
//! ## Zero knowledge storage
//!
//! Vault ciphertext, initialization vectors, and recovery payloads are
//! produced client-side. The server stores them hex-encoded and returns
//! them unchanged; it never holds key material able to decrypt them.
//!
//! ## Sessions
//!
//! Sessions are opaque random token pairs (access + refresh). Only SHA-256
//! hashes are stored; a refresh rotates both tokens in place.

pub mod api;
pub mod cli;
pub mod codec;

pub use api::GIT_COMMIT_HASH;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
