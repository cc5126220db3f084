//! Database helpers for accounts, sessions, and recovery state.
//!
//! Registration writes (user + salt + TOTP device) share one transaction so
//! a failure leaves nothing behind. The login completeness check runs its
//! destructive delete inside a transaction for the same reason. Recovery
//! attempt counters are mutated with single-statement updates so two
//! concurrent failed attempts cannot under-count.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::handlers::{error::IncompleteReason, is_unique_violation};

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created,
    Conflict,
}

pub(super) struct UserRecord {
    pub(super) id: Uuid,
    pub(super) password_hash: String,
}

/// Login-time account gate result. `Incomplete` means the account was
/// deleted before the transaction committed.
#[derive(Debug)]
pub(super) enum CompletenessCheck {
    Ready { totp_secret: String },
    Incomplete(IncompleteReason),
}

#[derive(Debug, Clone)]
pub(super) struct RecoveryRecord {
    pub(super) secret_hash: String,
    pub(super) password: String,
    pub(super) iv: String,
    pub(super) attempts: i32,
    pub(super) last_attempt: Option<DateTime<Utc>>,
}

/// Create user, key-derivation salt, and unconfirmed TOTP device as a unit.
pub(super) async fn insert_account(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
    salt: &str,
    totp_secret: &str,
) -> Result<SignupOutcome> {
    let mut tx = pool.begin().await.context("begin register transaction")?;

    let query = r"
        INSERT INTO users (username, password_hash)
        VALUES ($1, $2)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await;

    let user_id: Uuid = match row {
        Ok(row) => row.get("id"),
        Err(err) => {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(SignupOutcome::Conflict);
            }
            return Err(err).context("failed to insert user");
        }
    };

    sqlx::query("INSERT INTO key_derivation_salts (user_id, salt) VALUES ($1, $2)")
        .bind(user_id)
        .bind(salt)
        .execute(&mut *tx)
        .await
        .context("failed to insert key-derivation salt")?;

    sqlx::query("INSERT INTO totp_devices (user_id, secret, confirmed) VALUES ($1, $2, FALSE)")
        .bind(user_id)
        .bind(totp_secret)
        .execute(&mut *tx)
        .await
        .context("failed to insert TOTP device")?;

    tx.commit().await.context("commit register transaction")?;

    Ok(SignupOutcome::Created)
}

pub(super) async fn lookup_user(pool: &PgPool, username: &str) -> Result<Option<UserRecord>> {
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("failed to lookup user")?;
    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        password_hash: row.get("password_hash"),
    }))
}

pub(super) async fn fetch_salt(pool: &PgPool, user_id: Uuid) -> Result<Option<String>> {
    let row = sqlx::query("SELECT salt FROM key_derivation_salts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch key-derivation salt")?;
    Ok(row.map(|row| row.get("salt")))
}

/// Mark the user's TOTP device confirmed; `false` when no device exists.
pub(super) async fn confirm_totp_device(pool: &PgPool, username: &str) -> Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE totp_devices
        SET confirmed = TRUE
        FROM users
        WHERE users.id = totp_devices.user_id
          AND users.username = $1
        ",
    )
    .bind(username)
    .execute(pool)
    .await
    .context("failed to confirm TOTP device")?;
    Ok(result.rows_affected() > 0)
}

/// Enforce the account-completeness invariant after a successful credential
/// check. An account without a recovery secret or without a confirmed TOTP
/// device is irrecoverable and is deleted here, inside the transaction, so
/// a crash cannot leave it half-removed.
pub(super) async fn check_completeness_or_delete(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<CompletenessCheck> {
    let mut tx = pool.begin().await.context("begin login gate transaction")?;

    let has_recovery: bool =
        sqlx::query("SELECT EXISTS (SELECT 1 FROM recovery_secrets WHERE user_id = $1) AS found")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .context("failed to check recovery secret")?
            .get("found");

    if !has_recovery {
        delete_user(&mut tx, user_id).await?;
        tx.commit().await.context("commit account deletion")?;
        return Ok(CompletenessCheck::Incomplete(IncompleteReason::NoRecovery));
    }

    let device = sqlx::query("SELECT secret, confirmed FROM totp_devices WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .context("failed to fetch TOTP device")?;

    let confirmed_secret = device.and_then(|row| {
        let confirmed: bool = row.get("confirmed");
        confirmed.then(|| row.get::<String, _>("secret"))
    });

    let Some(totp_secret) = confirmed_secret else {
        delete_user(&mut tx, user_id).await?;
        tx.commit().await.context("commit account deletion")?;
        return Ok(CompletenessCheck::Incomplete(IncompleteReason::NoTwoFactor));
    };

    tx.commit().await.context("commit login gate transaction")?;
    Ok(CompletenessCheck::Ready { totp_secret })
}

async fn delete_user(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, user_id: Uuid) -> Result<()> {
    // Cascades remove the salt, device, recovery row, sessions, and vault.
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut **tx)
        .await
        .context("failed to delete incomplete account")?;
    Ok(())
}

pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    access_token_hash: &[u8],
    refresh_token_hash: &[u8],
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
) -> Result<()> {
    let now = Utc::now();
    sqlx::query(
        r"
        INSERT INTO sessions
            (user_id, access_token_hash, refresh_token_hash, access_expires_at, refresh_expires_at)
        VALUES ($1, $2, $3, $4, $5)
        ",
    )
    .bind(user_id)
    .bind(access_token_hash)
    .bind(refresh_token_hash)
    .bind(now + Duration::seconds(access_ttl_seconds))
    .bind(now + Duration::seconds(refresh_ttl_seconds))
    .execute(pool)
    .await
    .context("failed to insert session")?;
    Ok(())
}

/// Resolve an unexpired access-token hash to its user.
pub(super) async fn lookup_access_session(
    pool: &PgPool,
    access_token_hash: &[u8],
) -> Result<Option<(Uuid, String)>> {
    let row = sqlx::query(
        r"
        SELECT users.id, users.username
        FROM sessions
        JOIN users ON users.id = sessions.user_id
        WHERE sessions.access_token_hash = $1
          AND sessions.access_expires_at > NOW()
        ",
    )
    .bind(access_token_hash)
    .fetch_optional(pool)
    .await
    .context("failed to lookup session")?;
    Ok(row.map(|row| (row.get("id"), row.get("username"))))
}

/// Rotate a session found by its unexpired refresh-token hash. Returns the
/// user id, or `None` when the refresh token is unknown or expired.
pub(super) async fn rotate_session(
    pool: &PgPool,
    refresh_token_hash: &[u8],
    new_access_token_hash: &[u8],
    new_refresh_token_hash: &[u8],
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
) -> Result<Option<Uuid>> {
    let now = Utc::now();
    let row = sqlx::query(
        r"
        UPDATE sessions
        SET access_token_hash = $2,
            refresh_token_hash = $3,
            access_expires_at = $4,
            refresh_expires_at = $5
        WHERE refresh_token_hash = $1
          AND refresh_expires_at > NOW()
        RETURNING user_id
        ",
    )
    .bind(refresh_token_hash)
    .bind(new_access_token_hash)
    .bind(new_refresh_token_hash)
    .bind(now + Duration::seconds(access_ttl_seconds))
    .bind(now + Duration::seconds(refresh_ttl_seconds))
    .fetch_optional(pool)
    .await
    .context("failed to rotate session")?;
    Ok(row.map(|row| row.get("user_id")))
}

pub(super) async fn update_password_hash(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await
        .context("failed to update password hash")?;
    Ok(())
}

pub(super) async fn fetch_recovery(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<RecoveryRecord>> {
    let row = sqlx::query(
        r"
        SELECT secret_hash, password, iv, attempts, last_attempt
        FROM recovery_secrets
        WHERE user_id = $1
        ",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch recovery secret")?;
    Ok(row.map(|row| RecoveryRecord {
        secret_hash: row.get("secret_hash"),
        password: row.get("password"),
        iv: row.get("iv"),
        attempts: row.get("attempts"),
        last_attempt: row.get("last_attempt"),
    }))
}

/// Overwrite the user's single recovery row. Only the secret hash and the
/// escrowed ciphertext are replaced; the attempt counters are untouched, so
/// storing a new secret cannot shortcut a live lockout. The counter clears
/// only through `reset_expired_lockout` once the window has elapsed.
pub(super) async fn upsert_recovery(
    pool: &PgPool,
    user_id: Uuid,
    secret_hash: &str,
    password_hex: &str,
    iv_hex: &str,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO recovery_secrets (user_id, secret_hash, password, iv, attempts, last_attempt)
        VALUES ($1, $2, $3, $4, 0, NULL)
        ON CONFLICT (user_id) DO UPDATE
        SET secret_hash = $2,
            password = $3,
            iv = $4
        ",
    )
    .bind(user_id)
    .bind(secret_hash)
    .bind(password_hex)
    .bind(iv_hex)
    .execute(pool)
    .await
    .context("failed to upsert recovery secret")?;
    Ok(())
}

/// Conditional reset once the lockout window has elapsed. The guard inside
/// the statement keeps concurrent verifies from resetting a live lockout.
pub(super) async fn reset_expired_lockout(
    pool: &PgPool,
    user_id: Uuid,
    max_attempts: i32,
    lockout_seconds: i64,
) -> Result<()> {
    sqlx::query(
        r"
        UPDATE recovery_secrets
        SET attempts = 0
        WHERE user_id = $1
          AND attempts >= $2
          AND last_attempt <= NOW() - make_interval(secs => $3::double precision)
        ",
    )
    .bind(user_id)
    .bind(max_attempts)
    .bind(lockout_seconds as f64)
    .execute(pool)
    .await
    .context("failed to reset recovery attempts")?;
    Ok(())
}

/// Atomic failed-attempt accounting; never called on success.
pub(super) async fn record_failed_recovery_attempt(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query(
        r"
        UPDATE recovery_secrets
        SET attempts = attempts + 1,
            last_attempt = NOW()
        WHERE user_id = $1
        ",
    )
    .bind(user_id)
    .execute(pool)
    .await
    .context("failed to record recovery attempt")?;
    Ok(())
}
