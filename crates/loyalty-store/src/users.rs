//! The user table.
//!
//! Accounts belong to the authentication gateway in front of the service.
//! The ledger only needs a row per id for `balance_operation.user_id` to
//! reference, so the first write made for an id creates it.

use chrono::{DateTime, Utc};
use loyalty_types::{LoyaltyError, Result, UserId};
use rusqlite::{params, Connection};

use crate::sqlite::storage;

/// Make sure a live row exists for `user_id`. Idempotent.
///
/// Runs on the caller's connection so it shares the write transaction of
/// the ledger write it precedes. A soft-deleted user is `Unauthenticated`.
pub(crate) fn provision(conn: &Connection, user_id: UserId) -> Result<()> {
    let created = conn
        .execute(
            r#"INSERT INTO "user" ("id", "created_at") VALUES (?1, ?2)
               ON CONFLICT ("id") DO NOTHING"#,
            params![user_id.0, Utc::now()],
        )
        .map_err(storage)?;
    if created > 0 {
        tracing::info!(%user_id, "user provisioned");
        return Ok(());
    }

    let deleted_at: Option<DateTime<Utc>> = conn
        .query_row(
            r#"SELECT "deleted_at" FROM "user" WHERE "id" = ?1"#,
            params![user_id.0],
            |row| row.get(0),
        )
        .map_err(storage)?;
    match deleted_at {
        Some(_) => Err(LoyaltyError::Unauthenticated),
        None => Ok(()),
    }
}
