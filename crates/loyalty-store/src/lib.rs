//! # loyalty-store
//!
//! **Ledger Store**: the durable table of balance operations and the
//! constraints that make the rest of the system safe.
//!
//! ## Architecture
//!
//! Components never see a database handle. Each one depends on the narrow
//! capability trait it needs:
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`AccrualRegistry`] | Submission Gate |
//! | [`BalanceReader`] | Balance Calculator |
//! | [`WithdrawalLedger`] | Withdrawal Guard |
//! | [`HistoryReader`] | order / withdrawal listings |
//! | [`ClaimLedger`] | Reconciliation producer and consumer |
//!
//! [`SqliteLedger`] implements all of them over one shared connection.
//! User rows are provisioned by the write paths themselves; accounts and
//! credentials belong to the authentication gateway.
//! Correctness rests on per-statement atomicity, `BEGIN IMMEDIATE`
//! transactions, and the schema's partial unique index on accrual order
//! numbers; there is no in-process locking beyond connection access.

pub mod schema;
pub mod sqlite;
pub mod traits;
mod users;

pub use sqlite::SqliteLedger;
pub use traits::{
    AccrualRegistry, BalanceReader, ClaimLedger, DebitOutcome, HistoryReader, InsertOutcome,
    WithdrawalLedger,
};
