//! Route handlers and shared helpers.

pub mod auth;
pub mod error;
pub mod health;
pub mod vault;

pub use auth::types::MessageResponse;

/// Postgres unique violations (SQLSTATE 23505) are the conflict signal for
/// username and entry-name collisions.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
    }
}
