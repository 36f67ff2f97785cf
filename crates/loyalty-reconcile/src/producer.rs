//! Reconciliation producer: claims `NEW` accruals and feeds the channel.

use std::sync::Arc;

use loyalty_store::ClaimLedger;
use loyalty_types::{ClaimedOrder, PipelineConfig, Resolution};
use tokio::{
    sync::{mpsc, watch},
    time::{self, MissedTickBehavior},
};

use crate::pipeline::run_blocking;

/// Periodic claimer. Owns the sending half of the pipeline channel; dropping
/// it when [`Producer::run`] returns closes the channel.
pub struct Producer {
    ledger: Arc<dyn ClaimLedger>,
    tx: mpsc::Sender<ClaimedOrder>,
    config: PipelineConfig,
    shutdown: watch::Receiver<bool>,
}

impl Producer {
    #[must_use]
    pub fn new(
        ledger: Arc<dyn ClaimLedger>,
        tx: mpsc::Sender<ClaimedOrder>,
        config: PipelineConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            ledger,
            tx,
            config,
            shutdown,
        }
    }

    /// Run until shutdown is signalled or the consumer goes away.
    pub async fn run(mut self) {
        self.sweep_stale().await;

        let mut ticker = time::interval(self.config.claim_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_ms = self.config.claim_interval_ms, "producer started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.changed() => break,
            }

            let ledger = Arc::clone(&self.ledger);
            let claimed = match run_blocking(move || ledger.claim_new()).await {
                Ok(claimed) => claimed,
                Err(e) => {
                    tracing::error!(error = %e, "claim failed");
                    continue;
                }
            };
            if claimed.is_empty() {
                continue;
            }
            tracing::debug!(count = claimed.len(), "claimed orders");

            let undelivered = self.dispatch(claimed).await;
            if !undelivered.is_empty() {
                self.requeue(undelivered).await;
                break;
            }
        }

        tracing::info!("producer stopped");
    }

    /// Requeue claims orphaned by an unclean stop.
    async fn sweep_stale(&self) {
        let ledger = Arc::clone(&self.ledger);
        let older_than = self.config.stale_claim_after();
        match run_blocking(move || ledger.requeue_stale(older_than)).await {
            Ok(0) => {}
            Ok(requeued) => tracing::warn!(requeued, "requeued stale claims"),
            Err(e) => tracing::error!(error = %e, "stale claim sweep failed"),
        }
    }

    /// Push claims onto the channel, waiting for capacity. Returns whatever
    /// could not be delivered because of shutdown or a closed channel.
    async fn dispatch(&mut self, claimed: Vec<ClaimedOrder>) -> Vec<ClaimedOrder> {
        let mut rows = claimed.into_iter();
        while let Some(row) = rows.next() {
            let permit = tokio::select! {
                permit = self.tx.reserve() => permit.ok(),
                _ = self.shutdown.changed() => None,
            };
            match permit {
                Some(permit) => permit.send(row),
                None => {
                    let mut left = vec![row];
                    left.extend(rows);
                    return left;
                }
            }
        }
        Vec::new()
    }

    async fn requeue(&self, undelivered: Vec<ClaimedOrder>) {
        let batch: Vec<Resolution> = undelivered.iter().map(|c| Resolution::requeue(c.id)).collect();
        let ledger = Arc::clone(&self.ledger);
        match run_blocking(move || ledger.apply_resolutions(&batch)).await {
            Ok(requeued) => tracing::info!(requeued, "returned undelivered claims to NEW"),
            Err(e) => tracing::error!(
                error = %e,
                count = undelivered.len(),
                "could not requeue undelivered claims; the startup sweep will recover them"
            ),
        }
    }
}
