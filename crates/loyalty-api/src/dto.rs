//! Wire shapes of the user API.
//!
//! Amounts leave the service as JSON numbers in whole points (minor units
//! divided by 100) and enter it the same way.

use chrono::{DateTime, SecondsFormat, Utc};
use loyalty_types::{money, BalanceOperation, BalanceSnapshot, OperationStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};

/// One entry of `GET /api/user/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub number: String,
    pub status: OperationStatus,
    /// Present only once the order is `PROCESSED`.
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub accrual: Option<Decimal>,
    #[serde(serialize_with = "rfc3339")]
    pub uploaded_at: DateTime<Utc>,
}

impl From<&BalanceOperation> for OrderView {
    fn from(op: &BalanceOperation) -> Self {
        Self {
            number: op.order.clone(),
            status: op.status,
            accrual: (op.status == OperationStatus::Processed).then(|| money::from_minor_units(op.sum)),
            uploaded_at: op.created_at,
        }
    }
}

/// Body of `GET /api/user/balance`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BalanceView {
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

impl From<BalanceSnapshot> for BalanceView {
    fn from(snapshot: BalanceSnapshot) -> Self {
        Self {
            current: snapshot.current_decimal(),
            withdrawn: snapshot.withdrawn_decimal(),
        }
    }
}

/// Body of `POST /api/user/balance/withdraw`.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Decimal,
}

/// One entry of `GET /api/user/withdrawals`.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalView {
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    #[serde(serialize_with = "rfc3339")]
    pub processed_at: DateTime<Utc>,
}

impl From<&BalanceOperation> for WithdrawalView {
    fn from(op: &BalanceOperation) -> Self {
        Self {
            order: op.order.clone(),
            sum: money::from_minor_units(-op.sum),
            processed_at: op.created_at,
        }
    }
}

fn rfc3339<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true))
}
