//! Wiring and lifecycle of the producer / consumer pair.

use std::sync::Arc;

use loyalty_store::ClaimLedger;
use loyalty_types::{LoyaltyError, PipelineConfig, Result};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{consumer::Consumer, oracle::AccrualOracle, producer::Producer};

/// Handle to the two running pipeline tasks.
pub struct Pipeline {
    shutdown: watch::Sender<bool>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl Pipeline {
    /// Start the producer and consumer on the current runtime.
    ///
    /// # Errors
    /// `Configuration` if `config` is invalid.
    pub fn spawn(
        ledger: Arc<dyn ClaimLedger>,
        oracle: Arc<dyn AccrualOracle>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let (shutdown, signal) = watch::channel(false);

        let producer = Producer::new(Arc::clone(&ledger), tx, config.clone(), signal.clone());
        let consumer = Consumer::new(ledger, oracle, rx, config, signal);

        Ok(Self {
            shutdown,
            producer: tokio::spawn(producer.run()),
            consumer: tokio::spawn(consumer.run()),
        })
    }

    /// Signal both tasks and wait for them, including the consumer's final
    /// flush.
    ///
    /// # Errors
    /// `Internal` if either task panicked.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.send_replace(true);
        let producer = self.producer.await;
        let consumer = self.consumer.await;
        producer.map_err(|e| LoyaltyError::Internal(format!("producer task: {e}")))?;
        consumer.map_err(|e| LoyaltyError::Internal(format!("consumer task: {e}")))?;
        tracing::info!("reconciliation pipeline stopped");
        Ok(())
    }
}

/// Run a synchronous ledger call on the blocking pool.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LoyaltyError::Internal(format!("blocking task failed: {e}")))?
}
