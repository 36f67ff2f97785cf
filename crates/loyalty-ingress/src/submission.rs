//! Submission gate: the only way an accrual row enters the ledger.
//!
//! The gate rejects non-Luhn order numbers before touching storage, then
//! delegates the probe-and-insert to [`AccrualRegistry`], which runs both
//! under one write transaction. A duplicate by the same user is a success.

use std::sync::Arc;

use loyalty_store::{AccrualRegistry, InsertOutcome};
use loyalty_types::{luhn, LoyaltyError, OperationId, Result, UserId};

/// Non-error outcomes of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A new `NEW` accrual row was written; it will be reconciled.
    Accepted(OperationId),
    /// This user already registered the order. Nothing was written.
    AlreadyRegistered,
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Validates and registers accrual orders.
pub struct SubmissionGate {
    registry: Arc<dyn AccrualRegistry>,
}

impl SubmissionGate {
    #[must_use]
    pub fn new(registry: Arc<dyn AccrualRegistry>) -> Self {
        Self { registry }
    }

    /// Register `order_number` for `user_id`.
    ///
    /// # Errors
    /// - `InvalidOrderNumber` if the trimmed number fails the Luhn check
    /// - `OrderOwnedByAnotherUser` if another user holds the number
    /// - `Storage` if the ledger fails
    pub fn submit(&self, user_id: UserId, order_number: &str) -> Result<SubmitOutcome> {
        let order = luhn::validate(order_number)?;

        match self.registry.register_accrual(user_id, order)? {
            InsertOutcome::Inserted(id) => {
                tracing::info!(%user_id, order, %id, "order accepted");
                Ok(SubmitOutcome::Accepted(id))
            }
            InsertOutcome::Existing { owner } if owner == user_id => {
                tracing::debug!(%user_id, order, "order already registered by submitter");
                Ok(SubmitOutcome::AlreadyRegistered)
            }
            InsertOutcome::Existing { owner } => {
                tracing::info!(%user_id, %owner, order, "order owned by another user");
                Err(LoyaltyError::OrderOwnedByAnotherUser(order.to_string()))
            }
        }
    }
}
