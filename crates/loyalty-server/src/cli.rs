//! Command-line flags. Each flag falls back to an environment variable and
//! then to the built-in default; an explicit flag wins over the environment.

use clap::{Parser, ValueEnum};
use loyalty_types::{constants, OracleConfig, PipelineConfig, ServiceConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "loyalty-server", version, about = "Loyalty points ledger service")]
pub struct Cli {
    /// HTTP listen address (`host:port`).
    #[arg(short = 'a', long, env = "RUN_ADDRESS", default_value = constants::DEFAULT_RUN_ADDRESS)]
    pub run_address: String,

    /// SQLite database file.
    #[arg(short = 'd', long, env = "DATABASE_URI", default_value = constants::DEFAULT_DATABASE_PATH)]
    pub database: String,

    /// Accrual oracle base URL.
    #[arg(short = 'r', long, env = "ACCRUAL_SYSTEM_ADDRESS", default_value = constants::DEFAULT_ACCRUAL_ADDRESS)]
    pub accrual_address: String,

    #[arg(long, env = "CLAIM_INTERVAL_MS", default_value_t = constants::DEFAULT_CLAIM_INTERVAL_MS)]
    pub claim_interval_ms: u64,

    #[arg(long, env = "FLUSH_INTERVAL_MS", default_value_t = constants::DEFAULT_FLUSH_INTERVAL_MS)]
    pub flush_interval_ms: u64,

    #[arg(long, default_value_t = constants::DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    #[arg(long, default_value_t = constants::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Requeue `PROCESSING` claims older than this at startup.
    #[arg(long, default_value_t = constants::DEFAULT_STALE_CLAIM_AFTER_SECS)]
    pub stale_claim_after_secs: u64,

    #[arg(long, env = "ORACLE_TIMEOUT_MS", default_value_t = constants::DEFAULT_ORACLE_TIMEOUT_MS)]
    pub oracle_timeout_ms: u64,

    #[arg(long, default_value_t = constants::DEFAULT_ORACLE_MAX_ATTEMPTS)]
    pub oracle_max_attempts: u32,

    #[arg(long, value_enum, env = "LOG_FORMAT", default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn into_config(self) -> ServiceConfig {
        ServiceConfig {
            run_address: self.run_address,
            database_path: self.database,
            accrual_address: self.accrual_address,
            pipeline: PipelineConfig {
                claim_interval_ms: self.claim_interval_ms,
                flush_interval_ms: self.flush_interval_ms,
                channel_capacity: self.channel_capacity,
                batch_size: self.batch_size,
                stale_claim_after_secs: self.stale_claim_after_secs,
            },
            oracle: OracleConfig {
                request_timeout_ms: self.oracle_timeout_ms,
                max_attempts: self.oracle_max_attempts,
                ..OracleConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "loyalty-server",
            "-a",
            "0.0.0.0:9000",
            "-d",
            "/tmp/ledger.db",
            "-r",
            "http://oracle:8080",
            "--batch-size",
            "10",
        ])
        .unwrap();
        let config = cli.into_config();
        assert_eq!(config.run_address, "0.0.0.0:9000");
        assert_eq!(config.database_path, "/tmp/ledger.db");
        assert_eq!(config.accrual_address, "http://oracle:8080");
        assert_eq!(config.pipeline.batch_size, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn log_format_parses() {
        let cli = Cli::try_parse_from(["loyalty-server", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["loyalty-server", "--log-format", "xml"]).is_err());
    }
}
