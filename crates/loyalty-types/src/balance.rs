//! Balance snapshot returned by the balance calculator.
//!
//! Both numbers come from one aggregate over the ledger, so `current` and
//! `withdrawn` always describe the same moment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money;

/// A user's balance at one point in time, in minor units.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceSnapshot {
    /// Σ sum over the user's settled rows (withdrawals are negative).
    pub current: i64,
    /// |Σ sum| over the user's settled withdrawals.
    pub withdrawn: i64,
}

impl BalanceSnapshot {
    #[must_use]
    pub fn new(current: i64, withdrawn: i64) -> Self {
        Self { current, withdrawn }
    }

    /// Whether `amount` minor units can be debited.
    #[must_use]
    pub fn covers(&self, amount: i64) -> bool {
        amount <= self.current
    }

    #[must_use]
    pub fn current_decimal(&self) -> Decimal {
        money::from_minor_units(self.current)
    }

    #[must_use]
    pub fn withdrawn_decimal(&self) -> Decimal {
        money::from_minor_units(self.withdrawn)
    }
}
