//! SQLite-backed ledger.
//!
//! RULE: only this module and `users` execute SQL. Components reach the
//! ledger through the traits in [`crate::traits`].
//!
//! Every write for a user first provisions that user's row (see
//! `users::provision`) inside the same transaction.
//!
//! Write paths that read before they write (`register_accrual`,
//! `debit_if_covered`, `apply_resolutions`) run under `BEGIN IMMEDIATE`, so
//! the write lock is taken before the read and two writers can never act on
//! the same pre-write snapshot, whether they share this handle or open the
//! same file separately.

use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};
use loyalty_types::{
    BalanceOperation, BalanceSnapshot, ClaimedOrder, LoyaltyError, OperationId, OperationStatus,
    OperationType, Resolution, Result, UserId,
};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::{
    schema, users,
    traits::{
        AccrualRegistry, BalanceReader, ClaimLedger, DebitOutcome, HistoryReader, InsertOutcome,
        WithdrawalLedger,
    },
};

/// How long a statement waits on another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const BALANCE_SQL: &str = r#"
    SELECT
        COALESCE(SUM("sum"), 0),
        COALESCE(SUM(CASE WHEN "type" = 'WITHDRAW' THEN "sum" ELSE 0 END), 0)
    FROM "balance_operation"
    WHERE "user_id" = ?1 AND "deleted_at" IS NULL AND "status" = 'PROCESSED'
"#;

const OPERATION_COLUMNS: &str = r#""id", "order", "sum", "status", "type", "user_id", "created_at", "updated_at", "deleted_at""#;

/// The balance operation ledger over one SQLite connection.
///
/// The handle is the process-wide storage resource: construct it once at
/// startup and share it (`Arc<SqliteLedger>`) with every component.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) the ledger at `path` and bring the schema up to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(storage)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(storage)?;
        conn.pragma_update(None, "synchronous", "NORMAL").map_err(storage)?;
        Self::init(conn)
    }

    /// Open a private in-memory ledger (tests, ephemeral runs).
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(storage)?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(storage)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(storage)?;
        let applied = schema::migrate(&mut conn).map_err(storage)?;
        if applied > 0 {
            let version = schema::version(&conn).map_err(storage)?;
            tracing::info!(applied, version, "ledger schema migrated");
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LoyaltyError::Storage("connection lock poisoned".into()))
    }

    /// Soft-delete a row. No flow uses this; it exists so the schema's
    /// `deleted_at` affordance can be exercised.
    pub fn soft_delete(&self, id: OperationId) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                r#"UPDATE "balance_operation" SET "deleted_at" = ?2
                   WHERE "id" = ?1 AND "deleted_at" IS NULL"#,
                params![id.0, Utc::now()],
            )
            .map_err(storage)?;
        Ok(changed == 1)
    }

    /// Fetch one live row by id.
    pub fn operation(&self, id: OperationId) -> Result<Option<BalanceOperation>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                r#"SELECT {OPERATION_COLUMNS} FROM "balance_operation"
                   WHERE "id" = ?1 AND "deleted_at" IS NULL"#
            ),
            params![id.0],
            row_to_operation,
        )
        .optional()
        .map_err(storage)
    }

    /// Count live accrual rows in `status`.
    pub fn count_accruals(&self, status: OperationStatus) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                r#"SELECT COUNT(*) FROM "balance_operation"
                   WHERE "type" = 'ACCRUAL' AND "status" = ?1 AND "deleted_at" IS NULL"#,
                params![status.as_str()],
                |row| row.get(0),
            )
            .map_err(storage)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl AccrualRegistry for SqliteLedger {
    fn register_accrual(&self, user_id: UserId, order: &str) -> Result<InsertOutcome> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage)?;
        users::provision(&tx, user_id)?;

        let owner: Option<i64> = tx
            .query_row(
                r#"SELECT "user_id" FROM "balance_operation"
                   WHERE "order" = ?1 AND "type" = 'ACCRUAL' AND "deleted_at" IS NULL"#,
                params![order],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage)?;
        if let Some(owner) = owner {
            return Ok(InsertOutcome::Existing {
                owner: UserId(owner),
            });
        }

        let now = Utc::now();
        tx.execute(
            r#"INSERT INTO "balance_operation"
               ("order", "status", "type", "sum", "user_id", "created_at", "updated_at")
               VALUES (?1, ?2, ?3, 0, ?4, ?5, ?5)"#,
            params![
                order,
                OperationStatus::New.as_str(),
                OperationType::Accrual.as_str(),
                user_id.0,
                now
            ],
        )
        .map_err(storage)?;
        let id = OperationId(tx.last_insert_rowid());
        tx.commit().map_err(storage)?;

        tracing::debug!(%user_id, order, %id, "accrual registered");
        Ok(InsertOutcome::Inserted(id))
    }
}

impl BalanceReader for SqliteLedger {
    fn balance(&self, user_id: UserId) -> Result<BalanceSnapshot> {
        let conn = self.lock()?;
        read_balance(&conn, user_id)
    }
}

impl WithdrawalLedger for SqliteLedger {
    fn debit_if_covered(&self, user_id: UserId, order: &str, amount: i64) -> Result<DebitOutcome> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage)?;
        users::provision(&tx, user_id)?;

        let snapshot = read_balance(&tx, user_id)?;
        if !snapshot.covers(amount) {
            // Dropping the transaction rolls it back; nothing was written.
            return Ok(DebitOutcome::Insufficient(snapshot));
        }

        let now = Utc::now();
        tx.execute(
            r#"INSERT INTO "balance_operation"
               ("order", "status", "type", "sum", "user_id", "created_at", "updated_at")
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"#,
            params![
                order,
                OperationStatus::Processed.as_str(),
                OperationType::Withdraw.as_str(),
                -amount,
                user_id.0,
                now
            ],
        )
        .map_err(storage)?;
        let id = OperationId(tx.last_insert_rowid());
        tx.commit().map_err(storage)?;
        Ok(DebitOutcome::Debited(id))
    }
}

impl HistoryReader for SqliteLedger {
    fn accruals(&self, user_id: UserId) -> Result<Vec<BalanceOperation>> {
        let conn = self.lock()?;
        query_operations(
            &conn,
            &format!(
                r#"SELECT {OPERATION_COLUMNS} FROM "balance_operation"
                   WHERE "user_id" = ?1 AND "type" = 'ACCRUAL' AND "deleted_at" IS NULL
                   ORDER BY "created_at" DESC, "id" DESC"#
            ),
            user_id,
        )
    }

    fn withdrawals(&self, user_id: UserId) -> Result<Vec<BalanceOperation>> {
        let conn = self.lock()?;
        query_operations(
            &conn,
            &format!(
                r#"SELECT {OPERATION_COLUMNS} FROM "balance_operation"
                   WHERE "user_id" = ?1 AND "type" = 'WITHDRAW' AND "status" = 'PROCESSED'
                     AND "deleted_at" IS NULL
                   ORDER BY "created_at" DESC, "id" DESC"#
            ),
            user_id,
        )
    }
}

impl ClaimLedger for SqliteLedger {
    fn claim_new(&self) -> Result<Vec<ClaimedOrder>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                r#"UPDATE "balance_operation"
                   SET "status" = 'PROCESSING', "updated_at" = ?1
                   WHERE "deleted_at" IS NULL AND "type" = 'ACCRUAL' AND "status" = 'NEW'
                   RETURNING "id", "order""#,
            )
            .map_err(storage)?;
        let claimed = stmt
            .query_map(params![Utc::now()], |row| {
                Ok(ClaimedOrder {
                    id: OperationId(row.get(0)?),
                    order: row.get(1)?,
                })
            })
            .map_err(storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage)?;
        Ok(claimed)
    }

    fn apply_resolutions(&self, batch: &[Resolution]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage)?;
        let now = Utc::now();
        let mut updated = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    r#"UPDATE "balance_operation"
                       SET "status" = ?2, "sum" = ?3, "updated_at" = ?4
                       WHERE "id" = ?1 AND "status" = 'PROCESSING' AND "deleted_at" IS NULL"#,
                )
                .map_err(storage)?;
            for resolution in batch {
                updated += stmt
                    .execute(params![
                        resolution.id.0,
                        resolution.status.as_str(),
                        resolution.sum,
                        now
                    ])
                    .map_err(storage)?;
            }
        }
        tx.commit().map_err(storage)?;
        if updated < batch.len() {
            tracing::warn!(
                submitted = batch.len(),
                updated,
                "some resolutions targeted rows no longer in PROCESSING"
            );
        }
        Ok(updated)
    }

    fn requeue_stale(&self, older_than: Duration) -> Result<usize> {
        let age = chrono::Duration::from_std(older_than)
            .map_err(|e| LoyaltyError::Internal(format!("stale threshold out of range: {e}")))?;
        let now = Utc::now();
        let cutoff = now - age;
        let conn = self.lock()?;
        conn.execute(
            r#"UPDATE "balance_operation"
               SET "status" = 'NEW', "updated_at" = ?1
               WHERE "deleted_at" IS NULL AND "type" = 'ACCRUAL'
                 AND "status" = 'PROCESSING' AND "updated_at" <= ?2"#,
            params![now, cutoff],
        )
        .map_err(storage)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a driver error into the ledger's taxonomy.
pub(crate) fn storage(err: rusqlite::Error) -> LoyaltyError {
    LoyaltyError::Storage(err.to_string())
}

fn read_balance(conn: &Connection, user_id: UserId) -> Result<BalanceSnapshot> {
    let (current, withdrawn_sum): (i64, i64) = conn
        .query_row(BALANCE_SQL, params![user_id.0], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(storage)?;
    Ok(BalanceSnapshot::new(current, -withdrawn_sum))
}

fn query_operations(conn: &Connection, sql: &str, user_id: UserId) -> Result<Vec<BalanceOperation>> {
    let mut stmt = conn.prepare_cached(sql).map_err(storage)?;
    let rows = stmt
        .query_map(params![user_id.0], row_to_operation)
        .map_err(storage)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(storage)?;
    Ok(rows)
}

fn row_to_operation(row: &Row<'_>) -> rusqlite::Result<BalanceOperation> {
    let status: String = row.get(3)?;
    let op_type: String = row.get(4)?;
    Ok(BalanceOperation {
        id: OperationId(row.get(0)?),
        order: row.get(1)?,
        sum: row.get(2)?,
        status: status.parse().map_err(|e| conversion(3, e))?,
        op_type: op_type.parse().map_err(|e| conversion(4, e))?,
        user_id: UserId(row.get(5)?),
        created_at: row.get::<_, DateTime<Utc>>(6)?,
        updated_at: row.get::<_, DateTime<Utc>>(7)?,
        deleted_at: row.get::<_, Option<DateTime<Utc>>>(8)?,
    })
}

fn conversion(idx: usize, err: LoyaltyError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}
