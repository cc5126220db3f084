use clap::{Arg, ArgAction, Command};

pub const ARG_ISSUER: &str = "totp-issuer";
pub const ARG_SKIP_TOTP_CODE: &str = "skip-totp-code";
pub const ARG_ACCESS_TTL: &str = "access-ttl-seconds";
pub const ARG_REFRESH_TTL: &str = "refresh-ttl-seconds";
pub const ARG_RECOVERY_MAX_ATTEMPTS: &str = "recovery-max-attempts";
pub const ARG_RECOVERY_LOCKOUT: &str = "recovery-lockout-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Issuer embedded in TOTP provisioning URIs")
                .env("KEYWARDEN_TOTP_ISSUER")
                .default_value("keywarden"),
        )
        .arg(
            Arg::new(ARG_SKIP_TOTP_CODE)
                .long(ARG_SKIP_TOTP_CODE)
                .help("Skip the live TOTP code check on login (testing only)")
                .env("KEYWARDEN_SKIP_TOTP_CODE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_ACCESS_TTL)
                .long(ARG_ACCESS_TTL)
                .help("Access token TTL in seconds")
                .env("KEYWARDEN_ACCESS_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TTL)
                .long(ARG_REFRESH_TTL)
                .help("Refresh token TTL in seconds")
                .env("KEYWARDEN_REFRESH_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_RECOVERY_MAX_ATTEMPTS)
                .long(ARG_RECOVERY_MAX_ATTEMPTS)
                .help("Failed recovery attempts before lockout")
                .env("KEYWARDEN_RECOVERY_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new(ARG_RECOVERY_LOCKOUT)
                .long(ARG_RECOVERY_LOCKOUT)
                .help("Recovery lockout window in seconds")
                .env("KEYWARDEN_RECOVERY_LOCKOUT_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
}
