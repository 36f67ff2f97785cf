//! Configuration types for the service, the reconciliation pipeline and the
//! accrual oracle client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{constants, LoyaltyError, Result};

/// Top-level process configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// `host:port` for the HTTP API.
    pub run_address: String,
    /// SQLite database file (`:memory:` for an ephemeral ledger).
    pub database_path: String,
    /// Base URL of the accrual oracle.
    pub accrual_address: String,
    pub pipeline: PipelineConfig,
    pub oracle: OracleConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            run_address: constants::DEFAULT_RUN_ADDRESS.to_string(),
            database_path: constants::DEFAULT_DATABASE_PATH.to_string(),
            accrual_address: constants::DEFAULT_ACCRUAL_ADDRESS.to_string(),
            pipeline: PipelineConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Reject configurations the pipeline cannot run with.
    ///
    /// # Errors
    /// `Configuration` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.run_address.trim().is_empty() {
            return Err(LoyaltyError::Configuration("run_address is empty".into()));
        }
        if self.database_path.trim().is_empty() {
            return Err(LoyaltyError::Configuration("database_path is empty".into()));
        }
        if !(self.accrual_address.starts_with("http://") || self.accrual_address.starts_with("https://")) {
            return Err(LoyaltyError::Configuration(format!(
                "accrual_address must be an http(s) URL, got {:?}",
                self.accrual_address
            )));
        }
        self.pipeline.validate()?;
        self.oracle.validate()
    }
}

/// Reconciliation producer / consumer tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Producer claim period.
    pub claim_interval_ms: u64,
    /// Consumer periodic flush.
    pub flush_interval_ms: u64,
    /// Bounded channel capacity (backpressure limit).
    pub channel_capacity: usize,
    /// Buffered resolutions that trigger an immediate flush.
    pub batch_size: usize,
    /// Age after which a `PROCESSING` claim is requeued by the startup sweep.
    pub stale_claim_after_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            claim_interval_ms: constants::DEFAULT_CLAIM_INTERVAL_MS,
            flush_interval_ms: constants::DEFAULT_FLUSH_INTERVAL_MS,
            channel_capacity: constants::DEFAULT_CHANNEL_CAPACITY,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            stale_claim_after_secs: constants::DEFAULT_STALE_CLAIM_AFTER_SECS,
        }
    }
}

impl PipelineConfig {
    #[must_use]
    pub fn claim_interval(&self) -> Duration {
        Duration::from_millis(self.claim_interval_ms)
    }

    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    #[must_use]
    pub fn stale_claim_after(&self) -> Duration {
        Duration::from_secs(self.stale_claim_after_secs)
    }

    /// # Errors
    /// `Configuration` if any interval or size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.claim_interval_ms == 0 {
            return Err(LoyaltyError::Configuration("claim_interval_ms must be > 0".into()));
        }
        if self.flush_interval_ms == 0 {
            return Err(LoyaltyError::Configuration("flush_interval_ms must be > 0".into()));
        }
        if self.channel_capacity == 0 {
            return Err(LoyaltyError::Configuration("channel_capacity must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(LoyaltyError::Configuration("batch_size must be > 0".into()));
        }
        Ok(())
    }
}

/// Retrying accrual oracle client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OracleConfig {
    /// Timeout for one HTTP attempt.
    pub request_timeout_ms: u64,
    /// Attempts per order per consumer pass, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled per attempt.
    pub backoff_base_ms: u64,
    /// Cap on a single backoff delay.
    pub backoff_max_ms: u64,
    /// Cap on an honoured `Retry-After`.
    pub max_retry_after_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: constants::DEFAULT_ORACLE_TIMEOUT_MS,
            max_attempts: constants::DEFAULT_ORACLE_MAX_ATTEMPTS,
            backoff_base_ms: constants::DEFAULT_ORACLE_BACKOFF_BASE_MS,
            backoff_max_ms: constants::DEFAULT_ORACLE_BACKOFF_MAX_MS,
            max_retry_after_secs: constants::DEFAULT_MAX_RETRY_AFTER_SECS,
        }
    }
}

impl OracleConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Delay before retry number `attempt` (1-based): base · 2^(attempt-1),
    /// capped at `backoff_max_ms`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }

    #[must_use]
    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }

    /// # Errors
    /// `Configuration` if the timeout or attempt count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(LoyaltyError::Configuration("request_timeout_ms must be > 0".into()));
        }
        if self.max_attempts == 0 {
            return Err(LoyaltyError::Configuration("max_attempts must be > 0".into()));
        }
        Ok(())
    }
}
