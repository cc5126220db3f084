//! Runtime configuration shared by the auth handlers.

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_RECOVERY_MAX_ATTEMPTS: i32 = 3;
const DEFAULT_RECOVERY_LOCKOUT_SECONDS: i64 = 60 * 60;
const DEFAULT_ISSUER: &str = "keywarden";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    issuer: String,
    require_totp_code: bool,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    recovery_max_attempts: i32,
    recovery_lockout_seconds: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            require_totp_code: true,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            recovery_max_attempts: DEFAULT_RECOVERY_MAX_ATTEMPTS,
            recovery_lockout_seconds: DEFAULT_RECOVERY_LOCKOUT_SECONDS,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    /// Whether login demands a live TOTP code on top of the confirmed
    /// device. The upstream flow shipped with this check skipped; it is a
    /// flag here and on by default.
    #[must_use]
    pub fn with_require_totp_code(mut self, require: bool) -> Self {
        self.require_totp_code = require;
        self
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_recovery_max_attempts(mut self, attempts: i32) -> Self {
        self.recovery_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_recovery_lockout_seconds(mut self, seconds: i64) -> Self {
        self.recovery_lockout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn require_totp_code(&self) -> bool {
        self.require_totp_code
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn recovery_max_attempts(&self) -> i32 {
        self.recovery_max_attempts
    }

    #[must_use]
    pub fn recovery_lockout_seconds(&self) -> i64 {
        self.recovery_lockout_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enforce_totp_and_three_attempt_lockout() {
        let config = AuthConfig::new();
        assert!(config.require_totp_code());
        assert_eq!(config.recovery_max_attempts(), 3);
        assert_eq!(config.recovery_lockout_seconds(), 3600);
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new()
            .with_issuer("example".to_string())
            .with_require_totp_code(false)
            .with_access_ttl_seconds(60)
            .with_refresh_ttl_seconds(120);
        assert_eq!(config.issuer(), "example");
        assert!(!config.require_totp_code());
        assert_eq!(config.access_ttl_seconds(), 60);
        assert_eq!(config.refresh_ttl_seconds(), 120);
    }
}
