//! Withdrawal guard.
//!
//! A withdrawal settles immediately as a `PROCESSED` `WITHDRAW` row. The
//! balance check and the insert happen inside one write transaction in the
//! store, so two concurrent withdrawals can never both spend the same funds.
//!
//! Withdrawal order numbers must pass Luhn but are not unique: the same
//! number may be used for several withdrawals, and may match an accrual.

use std::sync::Arc;

use loyalty_store::{DebitOutcome, WithdrawalLedger};
use loyalty_types::{luhn, money, LoyaltyError, OperationId, Result, UserId};
use rust_decimal::Decimal;

/// Validates and commits debits.
pub struct WithdrawalGuard {
    ledger: Arc<dyn WithdrawalLedger>,
}

impl WithdrawalGuard {
    #[must_use]
    pub fn new(ledger: Arc<dyn WithdrawalLedger>) -> Self {
        Self { ledger }
    }

    /// Debit `amount` (in whole points, up to two decimals) from `user_id`.
    ///
    /// # Errors
    /// - `InvalidOrderNumber` if `order_number` fails the Luhn check
    /// - `Validation` if `amount` is not positive or has sub-cent digits
    /// - `InsufficientFunds` if `amount` exceeds the current balance
    /// - `Storage` if the ledger fails
    pub fn withdraw(&self, user_id: UserId, order_number: &str, amount: Decimal) -> Result<OperationId> {
        let order = luhn::validate(order_number)?;
        let cents = money::to_minor_units(amount)?;

        match self.ledger.debit_if_covered(user_id, order, cents)? {
            DebitOutcome::Debited(id) => {
                tracing::info!(%user_id, order, cents, %id, "withdrawal committed");
                Ok(id)
            }
            DebitOutcome::Insufficient(snapshot) => {
                tracing::info!(%user_id, order, cents, current = snapshot.current, "withdrawal refused");
                Err(LoyaltyError::InsufficientFunds {
                    needed: cents,
                    available: snapshot.current,
                })
            }
        }
    }
}
