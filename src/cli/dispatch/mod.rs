//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let issuer = matches
        .get_one::<String>(auth::ARG_ISSUER)
        .cloned()
        .unwrap_or_else(|| "keywarden".to_string());

    Ok(Action::Server(Args {
        port,
        dsn,
        issuer,
        skip_totp_code: matches.get_flag(auth::ARG_SKIP_TOTP_CODE),
        access_ttl_seconds: matches
            .get_one::<i64>(auth::ARG_ACCESS_TTL)
            .copied()
            .unwrap_or(900),
        refresh_ttl_seconds: matches
            .get_one::<i64>(auth::ARG_REFRESH_TTL)
            .copied()
            .unwrap_or(86400),
        recovery_max_attempts: matches
            .get_one::<i32>(auth::ARG_RECOVERY_MAX_ATTEMPTS)
            .copied()
            .unwrap_or(3),
        recovery_lockout_seconds: matches
            .get_one::<i64>(auth::ARG_RECOVERY_LOCKOUT)
            .copied()
            .unwrap_or(3600),
    }))
}
