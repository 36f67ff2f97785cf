//! Capability traits over the ledger.
//!
//! All methods are synchronous and short; async callers run them on the
//! blocking pool. Every read excludes soft-deleted rows.

use std::time::Duration;

use loyalty_types::{
    BalanceOperation, BalanceSnapshot, ClaimedOrder, OperationId, Resolution, Result, UserId,
};

/// Result of an idempotent accrual insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A fresh `NEW` accrual row was written.
    Inserted(OperationId),
    /// A live accrual row already holds this order number.
    Existing { owner: UserId },
}

/// Result of a guarded debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The `WITHDRAW` row was written.
    Debited(OperationId),
    /// The balance read inside the transaction did not cover the amount.
    /// Nothing was written.
    Insufficient(BalanceSnapshot),
}

/// Idempotent registration of accrual orders.
pub trait AccrualRegistry: Send + Sync {
    /// Probe for a live accrual with `order` and insert a `NEW` row if none
    /// exists, inside one transaction.
    fn register_accrual(&self, user_id: UserId, order: &str) -> Result<InsertOutcome>;
}

/// Balance aggregation.
pub trait BalanceReader: Send + Sync {
    /// Current balance and cumulative withdrawals from one aggregate statement.
    fn balance(&self, user_id: UserId) -> Result<BalanceSnapshot>;
}

/// Serialized check-then-insert of withdrawals.
pub trait WithdrawalLedger: Send + Sync {
    /// Recompute the balance and, if it covers `amount`, insert a `PROCESSED`
    /// `WITHDRAW` row with `sum = -amount`, all under one write transaction.
    fn debit_if_covered(&self, user_id: UserId, order: &str, amount: i64) -> Result<DebitOutcome>;
}

/// Per-user listings.
pub trait HistoryReader: Send + Sync {
    /// Live accrual rows of the user, newest first.
    fn accruals(&self, user_id: UserId) -> Result<Vec<BalanceOperation>>;

    /// Live `PROCESSED` withdrawal rows of the user, newest first.
    fn withdrawals(&self, user_id: UserId) -> Result<Vec<BalanceOperation>>;
}

/// Claim / lease operations used by the reconciliation pipeline.
pub trait ClaimLedger: Send + Sync {
    /// Move every live `NEW` accrual to `PROCESSING` in one statement and
    /// return the claimed rows.
    fn claim_new(&self) -> Result<Vec<ClaimedOrder>>;

    /// Write back a batch atomically. Only rows still in `PROCESSING` are
    /// touched; `sum` is set, not adjusted. Returns the number of rows updated.
    fn apply_resolutions(&self, batch: &[Resolution]) -> Result<usize>;

    /// Requeue `PROCESSING` rows claimed longer than `older_than` ago.
    fn requeue_stale(&self, older_than: Duration) -> Result<usize>;
}
