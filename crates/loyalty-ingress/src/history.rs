//! Per-user listings of accrual orders and withdrawals.

use std::sync::Arc;

use loyalty_store::HistoryReader;
use loyalty_types::{BalanceOperation, Result, UserId};

/// Read-only view of a user's ledger rows, newest first.
pub struct OrderHistory {
    reader: Arc<dyn HistoryReader>,
}

impl OrderHistory {
    #[must_use]
    pub fn new(reader: Arc<dyn HistoryReader>) -> Self {
        Self { reader }
    }

    /// Every live accrual the user submitted, in any status.
    pub fn orders(&self, user_id: UserId) -> Result<Vec<BalanceOperation>> {
        self.reader.accruals(user_id)
    }

    /// Every settled withdrawal of the user.
    pub fn withdrawals(&self, user_id: UserId) -> Result<Vec<BalanceOperation>> {
        self.reader.withdrawals(user_id)
    }
}
