//! Ledger row types.
//!
//! A [`BalanceOperation`] is one accrual or withdrawal entry. Accruals are
//! created `NEW` and walk `NEW → PROCESSING → {PROCESSED, INVALID}` (with a
//! `PROCESSING → NEW` requeue). Withdrawals are born `PROCESSED`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LoyaltyError, OperationId, UserId};

/// Processing status of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Registered, waiting to be claimed by the reconciliation producer.
    New,
    /// Claimed by one pipeline pass; the oracle is being consulted.
    Processing,
    /// The oracle rejected the order. Terminal.
    Invalid,
    /// Settled. Terminal; counts towards the balance.
    Processed,
}

impl OperationStatus {
    /// Storage / wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }

    /// `PROCESSED` and `INVALID` never transition again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = LoyaltyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "INVALID" => Ok(Self::Invalid),
            "PROCESSED" => Ok(Self::Processed),
            other => Err(LoyaltyError::Storage(format!("unknown operation status {other:?}"))),
        }
    }
}

/// Kind of ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Credit computed by the accrual oracle.
    Accrual,
    /// Debit requested by the user; always a negative `sum`.
    Withdraw,
}

impl OperationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accrual => "ACCRUAL",
            Self::Withdraw => "WITHDRAW",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = LoyaltyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCRUAL" => Ok(Self::Accrual),
            "WITHDRAW" => Ok(Self::Withdraw),
            other => Err(LoyaltyError::Storage(format!("unknown operation type {other:?}"))),
        }
    }
}

/// One row of the points ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceOperation {
    pub id: OperationId,
    /// External order number (decimal digits).
    pub order: String,
    /// Signed amount in minor units: positive credit, negative debit.
    pub sum: i64,
    pub status: OperationStatus,
    pub op_type: OperationType,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Last status transition (claim, requeue, resolution).
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker. Rows with this set are invisible to every read.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A row handed from the producer to the consumer after a successful claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedOrder {
    pub id: OperationId,
    pub order: String,
}

/// The write-back for one claimed row: its next status and final `sum`.
///
/// `sum` is the absolute value to store, never a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub id: OperationId,
    pub status: OperationStatus,
    pub sum: i64,
}

impl Resolution {
    /// Oracle settled the order for `accrual` minor units.
    #[must_use]
    pub fn processed(id: OperationId, accrual: i64) -> Self {
        Self {
            id,
            status: OperationStatus::Processed,
            sum: accrual,
        }
    }

    /// Oracle rejected the order.
    #[must_use]
    pub fn invalid(id: OperationId) -> Self {
        Self {
            id,
            status: OperationStatus::Invalid,
            sum: 0,
        }
    }

    /// Not resolvable yet: hand the row back to the producer.
    #[must_use]
    pub fn requeue(id: OperationId) -> Self {
        Self {
            id,
            status: OperationStatus::New,
            sum: 0,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl BalanceOperation {
    pub fn dummy_accrual(user_id: UserId, order: &str, status: OperationStatus, sum: i64) -> Self {
        let now = Utc::now();
        Self {
            id: OperationId(0),
            order: order.to_string(),
            sum,
            status,
            op_type: OperationType::Accrual,
            user_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn dummy_withdraw(user_id: UserId, order: &str, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            id: OperationId(0),
            order: order.to_string(),
            sum: -amount,
            status: OperationStatus::Processed,
            op_type: OperationType::Withdraw,
            user_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}
