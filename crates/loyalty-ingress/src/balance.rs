//! Balance calculator.

use std::sync::Arc;

use loyalty_store::BalanceReader;
use loyalty_types::{BalanceSnapshot, Result, UserId};

/// Derives `(current, withdrawn)` from the ledger.
///
/// Both numbers come from one aggregate statement, so they always describe
/// the same moment even while the reconciliation pipeline is flushing.
pub struct BalanceCalculator {
    reader: Arc<dyn BalanceReader>,
}

impl BalanceCalculator {
    #[must_use]
    pub fn new(reader: Arc<dyn BalanceReader>) -> Self {
        Self { reader }
    }

    pub fn balance(&self, user_id: UserId) -> Result<BalanceSnapshot> {
        self.reader.balance(user_id)
    }
}
