//! The accrual oracle seam.

use async_trait::async_trait;
use loyalty_types::{money, OperationId, Resolution, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Status values the oracle reports for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OracleStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

/// Body of a `200 OK` from `GET /api/orders/{number}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OracleReply {
    pub order: String,
    pub status: OracleStatus,
    #[serde(default)]
    pub accrual: Option<Decimal>,
}

impl OracleReply {
    /// Interpret the reply. A `PROCESSED` reply without `accrual` settles
    /// for zero.
    pub fn verdict(&self) -> Result<Verdict> {
        Ok(match self.status {
            OracleStatus::Registered | OracleStatus::Processing => Verdict::Pending,
            OracleStatus::Invalid => Verdict::Invalid,
            OracleStatus::Processed => Verdict::Processed {
                accrual: money::accrual_to_minor_units(self.accrual.unwrap_or_default())?,
            },
        })
    }
}

/// What the oracle knows about one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Still being registered or computed upstream.
    Pending,
    /// Rejected upstream; terminal.
    Invalid,
    /// Settled upstream for `accrual` minor units; terminal.
    Processed { accrual: i64 },
}

impl Verdict {
    /// The write-back for the claimed row `id`.
    #[must_use]
    pub fn resolve(self, id: OperationId) -> Resolution {
        match self {
            Self::Pending => Resolution::requeue(id),
            Self::Invalid => Resolution::invalid(id),
            Self::Processed { accrual } => Resolution::processed(id, accrual),
        }
    }
}

/// Source of accrual verdicts.
///
/// `Err` means the oracle could not answer this time (network failure,
/// retries exhausted, unknown order). Callers requeue; they never surface it.
#[async_trait]
pub trait AccrualOracle: Send + Sync {
    async fn query(&self, order: &str) -> Result<Verdict>;
}

#[cfg(test)]
mod tests {
    use loyalty_types::OperationStatus;

    use super::*;

    fn reply(json: &str) -> OracleReply {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn non_terminal_statuses_are_pending() {
        for status in ["REGISTERED", "PROCESSING"] {
            let r = reply(&format!(r#"{{"order":"12345678903","status":"{status}"}}"#));
            assert_eq!(r.verdict().unwrap(), Verdict::Pending);
        }
    }

    #[test]
    fn processed_accrual_is_truncated_to_cents() {
        let r = reply(r#"{"order":"12345678903","status":"PROCESSED","accrual":729.987}"#);
        assert_eq!(r.verdict().unwrap(), Verdict::Processed { accrual: 72_998 });

        let r = reply(r#"{"order":"12345678903","status":"PROCESSED","accrual":200}"#);
        assert_eq!(r.verdict().unwrap(), Verdict::Processed { accrual: 20_000 });
    }

    #[test]
    fn processed_without_accrual_settles_for_zero() {
        let r = reply(r#"{"order":"12345678903","status":"PROCESSED"}"#);
        assert_eq!(r.verdict().unwrap(), Verdict::Processed { accrual: 0 });
    }

    #[test]
    fn unknown_status_fails_to_parse() {
        assert!(serde_json::from_str::<OracleReply>(r#"{"order":"1","status":"LOST"}"#).is_err());
    }

    #[test]
    fn verdicts_map_to_resolutions() {
        let id = OperationId(9);
        assert_eq!(Verdict::Pending.resolve(id).status, OperationStatus::New);
        assert_eq!(Verdict::Invalid.resolve(id).status, OperationStatus::Invalid);
        let done = Verdict::Processed { accrual: 5 }.resolve(id);
        assert_eq!((done.status, done.sum), (OperationStatus::Processed, 5));
    }
}
