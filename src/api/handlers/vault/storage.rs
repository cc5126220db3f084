//! SQL storage for vault entries and their attached files.
//!
//! Every mutation is scoped by owner in the statement itself, so an absent
//! id and a foreign id produce the same zero-rows result. File inserts
//! check the parent entry's owner first since the file table carries no
//! user column of its own.

use anyhow::{Context, Result};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use uuid::Uuid;

use crate::api::handlers::is_unique_violation;

#[derive(Debug)]
pub(super) enum InsertOutcome {
    Created(Uuid),
    /// (user, name) already taken.
    Conflict,
}

#[derive(Debug, PartialEq, Eq)]
pub(super) enum UpdateOutcome {
    Updated,
    /// Renamed onto another of the caller's entry names.
    Conflict,
    /// Absent id and foreign id look the same to the caller.
    NotOwned,
}

#[derive(Debug, Clone)]
pub(super) struct EntryRow {
    pub(super) id: Uuid,
    pub(super) name: String,
    pub(super) username: String,
    pub(super) password: String,
    pub(super) iv: String,
}

impl<'r> FromRow<'r, PgRow> for EntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            username: row.try_get("username")?,
            password: row.try_get("password")?,
            iv: row.try_get("iv")?,
        })
    }
}

#[derive(Debug, Clone)]
pub(super) struct FileRow {
    pub(super) id: Uuid,
    pub(super) entry_id: Uuid,
    pub(super) name: String,
    pub(super) file: String,
    pub(super) iv: String,
}

impl<'r> FromRow<'r, PgRow> for FileRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            entry_id: row.try_get("entry_id")?,
            name: row.try_get("name")?,
            file: row.try_get("file")?,
            iv: row.try_get("iv")?,
        })
    }
}

/// Insert an entry; the (user, name) unique constraint decides conflicts,
/// not a racy lookup-then-insert.
pub(super) async fn insert_entry(
    pool: &PgPool,
    user_id: Uuid,
    name: &str,
    username: &str,
    password_hex: &str,
    iv_hex: &str,
) -> Result<InsertOutcome> {
    let row = sqlx::query(
        r"
        INSERT INTO vault_entries (user_id, name, username, password, iv)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        ",
    )
    .bind(user_id)
    .bind(name)
    .bind(username)
    .bind(password_hex)
    .bind(iv_hex)
    .fetch_one(pool)
    .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert vault entry"),
    }
}

pub(super) async fn fetch_entry_owner(pool: &PgPool, entry_id: Uuid) -> Result<Option<Uuid>> {
    let row = sqlx::query("SELECT user_id FROM vault_entries WHERE id = $1")
        .bind(entry_id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch entry owner")?;
    Ok(row.map(|row| row.get("user_id")))
}

pub(super) async fn update_entry(
    pool: &PgPool,
    user_id: Uuid,
    entry_id: Uuid,
    name: &str,
    username: &str,
    password_hex: &str,
    iv_hex: &str,
) -> Result<UpdateOutcome> {
    let result = sqlx::query(
        r"
        UPDATE vault_entries
        SET name = $3, username = $4, password = $5, iv = $6
        WHERE id = $1 AND user_id = $2
        ",
    )
    .bind(entry_id)
    .bind(user_id)
    .bind(name)
    .bind(username)
    .bind(password_hex)
    .bind(iv_hex)
    .execute(pool)
    .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => Ok(UpdateOutcome::Updated),
        Ok(_) => Ok(UpdateOutcome::NotOwned),
        Err(err) if is_unique_violation(&err) => Ok(UpdateOutcome::Conflict),
        Err(err) => Err(err).context("failed to update vault entry"),
    }
}

/// Owner-scoped delete; `false` when the id is absent or not the caller's.
pub(super) async fn delete_entry(pool: &PgPool, user_id: Uuid, entry_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM vault_entries WHERE id = $1 AND user_id = $2")
        .bind(entry_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("failed to delete vault entry")?;
    Ok(result.rows_affected() > 0)
}

pub(super) async fn list_entries(pool: &PgPool, user_id: Uuid) -> Result<Vec<EntryRow>> {
    sqlx::query_as::<_, EntryRow>(
        r"
        SELECT id, name, username, password, iv
        FROM vault_entries
        WHERE user_id = $1
        ORDER BY name
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list vault entries")
}

/// All files under all of the user's entries, for retrieve expansion.
pub(super) async fn list_files(pool: &PgPool, user_id: Uuid) -> Result<Vec<FileRow>> {
    sqlx::query_as::<_, FileRow>(
        r"
        SELECT file_entries.id, file_entries.entry_id,
               file_entries.name, file_entries.file, file_entries.iv
        FROM file_entries
        JOIN vault_entries ON vault_entries.id = file_entries.entry_id
        WHERE vault_entries.user_id = $1
        ORDER BY file_entries.name
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("failed to list file entries")
}

pub(super) async fn insert_file(
    pool: &PgPool,
    entry_id: Uuid,
    name: &str,
    file_hex: &str,
    iv_hex: &str,
) -> Result<Uuid> {
    let row = sqlx::query(
        r"
        INSERT INTO file_entries (entry_id, name, file, iv)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        ",
    )
    .bind(entry_id)
    .bind(name)
    .bind(file_hex)
    .bind(iv_hex)
    .fetch_one(pool)
    .await
    .context("failed to insert file entry")?;
    Ok(row.get("id"))
}

/// Transitively owner-scoped delete through the parent entry; `false` when
/// the id is absent or the parent entry is not the caller's.
pub(super) async fn delete_file(pool: &PgPool, user_id: Uuid, file_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r"
        DELETE FROM file_entries
        USING vault_entries
        WHERE file_entries.id = $1
          AND vault_entries.id = file_entries.entry_id
          AND vault_entries.user_id = $2
        ",
    )
    .bind(file_id)
    .bind(user_id)
    .execute(pool)
    .await
    .context("failed to delete file entry")?;
    Ok(result.rows_affected() > 0)
}

/// Owner-scoped file update for edit-batch items. Returns `false` when the
/// file does not exist or belongs to someone else's entry.
pub(super) async fn update_file(
    pool: &PgPool,
    user_id: Uuid,
    file_id: Uuid,
    name: &str,
    file_hex: &str,
    iv_hex: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE file_entries
        SET name = $3, file = $4, iv = $5
        FROM vault_entries
        WHERE file_entries.id = $1
          AND vault_entries.id = file_entries.entry_id
          AND vault_entries.user_id = $2
        ",
    )
    .bind(file_id)
    .bind(user_id)
    .bind(name)
    .bind(file_hex)
    .bind(iv_hex)
    .execute(pool)
    .await
    .context("failed to update file entry")?;
    Ok(result.rows_affected() > 0)
}
