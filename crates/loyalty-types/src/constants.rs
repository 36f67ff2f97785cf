//! System-wide constants for the loyalty ledger.

/// Decimal places of the ledger's minor unit (cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Minor units in one whole point.
pub const MINOR_UNITS_PER_UNIT: i64 = 100;

/// Default producer claim interval in milliseconds.
pub const DEFAULT_CLAIM_INTERVAL_MS: u64 = 1000;

/// Default consumer flush interval in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1000;

/// Capacity of the producer → consumer channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Resolved rows buffered before a size-triggered flush.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Claims older than this are considered abandoned at startup (seconds).
pub const DEFAULT_STALE_CLAIM_AFTER_SECS: u64 = 300;

/// Per-attempt timeout for an accrual oracle request (milliseconds).
pub const DEFAULT_ORACLE_TIMEOUT_MS: u64 = 2000;

/// Attempts per order per consumer pass, including the first.
pub const DEFAULT_ORACLE_MAX_ATTEMPTS: u32 = 3;

/// First retry delay (milliseconds); doubles per attempt.
pub const DEFAULT_ORACLE_BACKOFF_BASE_MS: u64 = 100;

/// Upper bound on a single retry delay (milliseconds).
pub const DEFAULT_ORACLE_BACKOFF_MAX_MS: u64 = 2000;

/// Upper bound on an honoured `Retry-After` (seconds).
pub const DEFAULT_MAX_RETRY_AFTER_SECS: u64 = 60;

/// Default HTTP listen address.
pub const DEFAULT_RUN_ADDRESS: &str = "localhost:8081";

/// Default SQLite database path.
pub const DEFAULT_DATABASE_PATH: &str = "loyalty.db";

/// Default accrual oracle base URL.
pub const DEFAULT_ACCRUAL_ADDRESS: &str = "http://localhost:8080";

/// Header carrying the authenticated user id from the auth gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
