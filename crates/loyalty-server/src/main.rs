//! # loyalty-server
//!
//! Boots the service:
//! 1. parse flags and install logging
//! 2. open the ledger (migrating the schema)
//! 3. spawn the reconciliation pipeline
//! 4. serve the HTTP API until `SIGINT` / `SIGTERM`
//! 5. stop the pipeline, waiting for its final flush

mod cli;
mod logging;

use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use loyalty_api::{router, AppState};
use loyalty_reconcile::{HttpAccrualOracle, Pipeline};
use loyalty_store::SqliteLedger;
use loyalty_types::{constants, LoyaltyError, Result, ServiceConfig};
use tokio::net::TcpListener;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    match run(cli.into_config()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "loyalty-server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServiceConfig) -> Result<()> {
    config.validate()?;
    tracing::info!(
        version = constants::VERSION,
        database = %config.database_path,
        accrual = %config.accrual_address,
        "starting"
    );

    let ledger = Arc::new(SqliteLedger::open(&config.database_path)?);
    let oracle = Arc::new(HttpAccrualOracle::new(&config.accrual_address, config.oracle.clone())?);
    let pipeline = Pipeline::spawn(ledger.clone(), oracle, config.pipeline.clone())?;

    let listener = match TcpListener::bind(&config.run_address).await {
        Ok(listener) => listener,
        Err(e) => {
            pipeline.shutdown().await?;
            return Err(LoyaltyError::Configuration(format!(
                "cannot listen on {}: {e}",
                config.run_address
            )));
        }
    };
    tracing::info!(address = %config.run_address, "http api listening");

    let served = axum::serve(listener, router(AppState::new(ledger)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tracing::info!("http api stopped, draining reconciliation pipeline");
    pipeline.shutdown().await?;
    served.map_err(|e| LoyaltyError::Internal(format!("http server: {e}")))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
