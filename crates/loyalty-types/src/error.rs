//! Error types for the loyalty ledger.
//!
//! All errors use the `LY_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Input errors
//! - 2xx: Ownership errors
//! - 3xx: Balance errors
//! - 4xx: Accrual oracle errors
//! - 5xx: Authentication errors
//! - 9xx: Storage / general / internal errors
//!
//! Each variant carries its boundary classification through
//! [`LoyaltyError::http_status`].

use thiserror::Error;

/// Central error enum for all ledger operations.
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // =================================================================
    // Input Errors (1xx)
    // =================================================================
    /// Malformed request input.
    #[error("LY_ERR_100: Validation failed: {reason}")]
    Validation { reason: String },

    /// The order number failed the Luhn check.
    #[error("LY_ERR_101: Invalid order number: {0:?}")]
    InvalidOrderNumber(String),

    // =================================================================
    // Ownership Errors (2xx)
    // =================================================================
    /// The order number is registered to a different user.
    #[error("LY_ERR_200: Order {0} is registered by another user")]
    OrderOwnedByAnotherUser(String),

    // =================================================================
    // Balance Errors (3xx)
    // =================================================================
    /// The requested withdrawal exceeds the current balance.
    #[error("LY_ERR_300: Insufficient funds: need {needed}, have {available} (minor units)")]
    InsufficientFunds { needed: i64, available: i64 },

    // =================================================================
    // Accrual Oracle Errors (4xx)
    // =================================================================
    /// Network error, 5xx, 429, 204 or a non-terminal status. Never leaves
    /// the reconciliation pipeline; the order is requeued instead.
    #[error("LY_ERR_400: Accrual oracle transient failure: {reason}")]
    OracleTransient { reason: String },

    // =================================================================
    // Authentication Errors (5xx)
    // =================================================================
    /// No verified identity on the request.
    #[error("LY_ERR_500: Unauthenticated")]
    Unauthenticated,

    // =================================================================
    // Storage / General / Internal (9xx)
    // =================================================================
    /// The ledger store failed; fatal to the current operation.
    #[error("LY_ERR_900: Storage error: {0}")]
    Storage(String),

    /// Configuration error (missing or out-of-range values).
    #[error("LY_ERR_901: Configuration error: {0}")]
    Configuration(String),

    /// Unrecoverable internal error.
    #[error("LY_ERR_902: Internal error: {0}")]
    Internal(String),
}

impl LoyaltyError {
    /// HTTP status the boundary reports for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Unauthenticated => 401,
            Self::InsufficientFunds { .. } => 402,
            Self::OrderOwnedByAnotherUser(_) => 409,
            Self::InvalidOrderNumber(_) => 422,
            Self::OracleTransient { .. }
            | Self::Storage(_)
            | Self::Configuration(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Whether the caller caused this error (4xx class).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoyaltyError>;
