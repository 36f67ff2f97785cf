//! # loyalty-reconcile
//!
//! **Reconciliation plane**: moves accrual orders from `NEW` to a terminal
//! status by asking the external accrual oracle.
//!
//! ## Architecture
//!
//! Two long-lived tasks joined by a bounded channel:
//! 1. **Producer**: on every tick, claims all `NEW` accruals (`NEW → PROCESSING`
//!    in one statement) and pushes them onto the channel. A full channel
//!    blocks the producer, which is the pipeline's backpressure.
//! 2. **Consumer**: resolves each claim through an [`AccrualOracle`], buffers
//!    the [`Resolution`](loyalty_types::Resolution), and flushes the buffer
//!    to the ledger in one transaction when it is full or the flush timer fires.
//!
//! ```text
//! ClaimLedger.claim_new() → Producer → mpsc(1024) → Consumer → AccrualOracle
//!                                                       ↓
//!                                   ClaimLedger.apply_resolutions(batch)
//! ```
//!
//! ## Lifecycle
//!
//! [`Pipeline::spawn`] starts both tasks; [`Pipeline::shutdown`] signals them
//! and waits. On shutdown every claim that was not resolved is written back
//! as `NEW`, and the buffer gets a final flush. Claims orphaned by a crash
//! are requeued by the producer's startup sweep.

pub mod consumer;
pub mod http_oracle;
pub mod oracle;
pub mod pipeline;
pub mod producer;

pub use consumer::{BatchBuffer, Consumer};
pub use http_oracle::HttpAccrualOracle;
pub use oracle::{AccrualOracle, OracleReply, OracleStatus, Verdict};
pub use pipeline::Pipeline;
pub use producer::Producer;
