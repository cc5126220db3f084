//! Account lifecycle, session issuance, and recovery handlers.

pub mod password;
pub mod principal;
pub mod recovery;
pub mod register;
pub mod salt;
pub mod state;
pub mod token;
pub mod two_factor;
pub mod types;

mod storage;
mod utils;

pub use principal::Principal;
pub use state::AuthConfig;

use anyhow::{anyhow, Result};
use totp_rs::{Algorithm, Secret, TOTP};

/// Build the TOTP instance for a stored base32 secret. Six digits, 30s
/// period, SHA-1: the parameters authenticator apps assume.
pub(crate) fn totp_for_secret(secret_base32: &str, issuer: &str, account: &str) -> Result<TOTP> {
    let secret_bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|err| anyhow!("invalid TOTP secret: {err:?}"))?;
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret_bytes,
        Some(issuer.to_string()),
        account.to_string(),
    )
    .map_err(|err| anyhow!("TOTP init error: {err}"))
}
