//! # loyalty-types
//!
//! Shared types, errors, and configuration for the **loyalty ledger**.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`OperationId`]
//! - **Ledger model**: [`BalanceOperation`], [`OperationStatus`], [`OperationType`],
//!   [`ClaimedOrder`], [`Resolution`]
//! - **Balance model**: [`BalanceSnapshot`]
//! - **Money**: minor-unit (cents) conversion helpers in [`money`]
//! - **Order numbers**: the Luhn check in [`luhn`]
//! - **Configuration**: [`ServiceConfig`], [`PipelineConfig`], [`OracleConfig`]
//! - **Errors**: [`LoyaltyError`] with `LY_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod luhn;
pub mod money;
pub mod operation;

// Re-export the primary types at crate root:
//   use loyalty_types::{BalanceOperation, OperationStatus, UserId, ...};

pub use balance::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use operation::*;

// `luhn`, `money` and `constants` are accessed by path
// (e.g. `loyalty_types::luhn::is_valid`).
