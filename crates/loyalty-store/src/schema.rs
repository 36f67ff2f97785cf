//! Ledger schema and migrations.
//!
//! Migrations are applied in order and tracked with `PRAGMA user_version`.
//! Column names that collide with SQL keywords are always quoted.

use rusqlite::Connection;

/// Ordered migrations; index + 1 is the resulting `user_version`.
pub const MIGRATIONS: &[&str] = &[
    // 1: users and the balance operation ledger. Credentials are optional:
    // rows for gateway-authenticated ids are created on first write.
    r#"
    CREATE TABLE IF NOT EXISTS "user" (
        "id"         INTEGER PRIMARY KEY AUTOINCREMENT,
        "login"      TEXT,
        "password"   TEXT,
        "created_at" TEXT NOT NULL,
        "deleted_at" TEXT
    );

    CREATE UNIQUE INDEX IF NOT EXISTS "login_idx"
        ON "user"("login") WHERE "deleted_at" IS NULL;

    CREATE TABLE IF NOT EXISTS "balance_operation" (
        "id"         INTEGER PRIMARY KEY AUTOINCREMENT,
        "order"      TEXT NOT NULL,
        "status"     TEXT NOT NULL
                     CHECK ("status" IN ('NEW', 'PROCESSING', 'INVALID', 'PROCESSED')),
        "type"       TEXT NOT NULL
                     CHECK ("type" IN ('ACCRUAL', 'WITHDRAW')),
        "sum"        INTEGER NOT NULL DEFAULT 0,
        "user_id"    INTEGER NOT NULL REFERENCES "user"("id"),
        "created_at" TEXT NOT NULL,
        "updated_at" TEXT NOT NULL,
        "deleted_at" TEXT,
        CHECK ("type" <> 'WITHDRAW' OR "sum" < 0)
    );

    CREATE UNIQUE INDEX IF NOT EXISTS "order_idx"
        ON "balance_operation"("order")
        WHERE "deleted_at" IS NULL AND "type" = 'ACCRUAL';

    CREATE INDEX IF NOT EXISTS "balance_operation_user_idx"
        ON "balance_operation"("user_id", "status")
        WHERE "deleted_at" IS NULL;

    CREATE INDEX IF NOT EXISTS "balance_operation_claim_idx"
        ON "balance_operation"("status", "updated_at")
        WHERE "deleted_at" IS NULL AND "type" = 'ACCRUAL';
    "#,
];

/// Apply every migration newer than the database's `user_version`.
///
/// Returns the number of migrations applied.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<usize> {
    let current: usize = conn.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))?
        .try_into()
        .unwrap_or(0);
    let pending = MIGRATIONS.iter().enumerate().skip(current);
    let mut applied = 0;
    for (idx, sql) in pending {
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", (idx + 1) as i64)?;
        tx.commit()?;
        applied += 1;
    }
    Ok(applied)
}

/// Current schema version.
pub fn version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}
