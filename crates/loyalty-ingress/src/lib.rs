//! # loyalty-ingress
//!
//! **Request plane**: the synchronous, request-scoped operations a user
//! triggers against the ledger.
//!
//! ## Architecture
//!
//! Each component is constructed once with the shared ledger handle,
//! injected as the narrow capability trait it needs:
//! 1. **SubmissionGate**: Luhn check, then idempotent accrual registration
//! 2. **WithdrawalGuard**: Luhn check, amount conversion, guarded debit
//! 3. **BalanceCalculator**: one-statement balance snapshot
//! 4. **OrderHistory**: per-user order and withdrawal listings
//!
//! ## Request Flow
//!
//! ```text
//! API → SubmissionGate.submit()   → AccrualRegistry.register_accrual()
//! API → WithdrawalGuard.withdraw() → WithdrawalLedger.debit_if_covered()
//! API → BalanceCalculator.balance() → BalanceReader.balance()
//! ```
//!
//! Nothing here locks in-process. Every cross-request guarantee comes from
//! the store's transactions and unique index.

pub mod balance;
pub mod history;
pub mod submission;
pub mod withdrawal;

pub use balance::BalanceCalculator;
pub use history::OrderHistory;
pub use submission::{SubmissionGate, SubmitOutcome};
pub use withdrawal::WithdrawalGuard;
