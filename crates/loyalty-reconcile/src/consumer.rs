//! Reconciliation consumer: resolves claims and flushes them in batches.

use std::sync::Arc;

use loyalty_store::ClaimLedger;
use loyalty_types::{ClaimedOrder, PipelineConfig, Resolution};
use tokio::{
    sync::{mpsc, watch},
    time::{self, Instant, MissedTickBehavior},
};

use crate::{oracle::AccrualOracle, pipeline::run_blocking};

/// Resolutions waiting for the next write-back.
///
/// Holds terminal results and requeues alike; both must reach the ledger,
/// the latter so no row is left in `PROCESSING`.
#[derive(Debug)]
pub struct BatchBuffer {
    pending: Vec<Resolution>,
    threshold: usize,
}

impl BatchBuffer {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            pending: Vec::with_capacity(threshold.min(4096)),
            threshold: threshold.max(1),
        }
    }

    /// Buffer a resolution. Returns `true` once the buffer should be flushed.
    pub fn push(&mut self, resolution: Resolution) -> bool {
        self.pending.push(resolution);
        self.is_full()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.pending.len() >= self.threshold
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Resolution] {
        &self.pending
    }

    /// Drop the first `n` entries after they were written.
    pub fn consume(&mut self, n: usize) {
        self.pending.drain(..n.min(self.pending.len()));
    }
}

/// Oracle-driven resolver with a batched write-back.
pub struct Consumer {
    ledger: Arc<dyn ClaimLedger>,
    oracle: Arc<dyn AccrualOracle>,
    rx: mpsc::Receiver<ClaimedOrder>,
    config: PipelineConfig,
    shutdown: watch::Receiver<bool>,
    buffer: BatchBuffer,
    /// Set after a failed flush; size-triggered flushes wait until then.
    retry_at: Option<Instant>,
}

impl Consumer {
    #[must_use]
    pub fn new(
        ledger: Arc<dyn ClaimLedger>,
        oracle: Arc<dyn AccrualOracle>,
        rx: mpsc::Receiver<ClaimedOrder>,
        config: PipelineConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let buffer = BatchBuffer::new(config.batch_size);
        Self {
            ledger,
            oracle,
            rx,
            config,
            shutdown,
            buffer,
            retry_at: None,
        }
    }

    /// Run until shutdown is signalled or the producer closes the channel,
    /// then requeue what is left in the channel and flush one last time.
    pub async fn run(mut self) {
        let period = self.config.flush_interval();
        let mut flush_timer = time::interval_at(Instant::now() + period, period);
        flush_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            flush_interval_ms = self.config.flush_interval_ms,
            batch_size = self.config.batch_size,
            "consumer started"
        );

        loop {
            tokio::select! {
                claim = self.rx.recv() => match claim {
                    Some(claim) => {
                        let id = claim.id;
                        let oracle = Arc::clone(&self.oracle);
                        let resolution = tokio::select! {
                            resolution = resolve(oracle.as_ref(), claim) => resolution,
                            _ = self.shutdown.changed() => {
                                tracing::debug!(%id, "shutdown during oracle call, requeueing");
                                self.buffer.push(Resolution::requeue(id));
                                break;
                            }
                        };
                        if self.buffer.push(resolution) && self.flush_due() {
                            self.flush().await;
                        }
                    }
                    None => break,
                },
                _ = flush_timer.tick() => {
                    if !self.buffer.is_empty() {
                        self.flush().await;
                    }
                }
                _ = self.shutdown.changed() => break,
            }
        }

        // No new claims after this; whatever is queued goes back to NEW.
        self.rx.close();
        let mut drained = 0usize;
        while let Some(claim) = self.rx.recv().await {
            self.buffer.push(Resolution::requeue(claim.id));
            drained += 1;
        }
        if drained > 0 {
            tracing::info!(drained, "requeueing undelivered claims");
        }
        if !self.buffer.is_empty() {
            self.flush().await;
        }
        if !self.buffer.is_empty() {
            tracing::error!(
                unflushed = self.buffer.len(),
                "final flush failed; rows stay PROCESSING until the startup sweep"
            );
        }
        tracing::info!("consumer stopped");
    }

    fn flush_due(&self) -> bool {
        self.retry_at.is_none_or(|at| Instant::now() >= at)
    }

    /// Write the buffer back in one transaction. On failure the buffer is
    /// kept; the next size-triggered attempt waits one flush interval, the
    /// timer and the final flush always try.
    async fn flush(&mut self) {
        let batch = self.buffer.as_slice().to_vec();
        let size = batch.len();
        let ledger = Arc::clone(&self.ledger);
        match run_blocking(move || ledger.apply_resolutions(&batch)).await {
            Ok(updated) => {
                tracing::debug!(size, updated, "flushed resolutions");
                self.buffer.consume(size);
                self.retry_at = None;
            }
            Err(e) => {
                tracing::error!(size, error = %e, "flush failed, keeping batch");
                self.retry_at = Some(Instant::now() + self.config.flush_interval());
            }
        }
    }
}

async fn resolve(oracle: &dyn AccrualOracle, claim: ClaimedOrder) -> Resolution {
    match oracle.query(&claim.order).await {
        Ok(verdict) => {
            let resolution = verdict.resolve(claim.id);
            if !resolution.is_terminal() {
                tracing::debug!(order = %claim.order, "order not final upstream, requeueing");
            }
            resolution
        }
        Err(e) => {
            tracing::warn!(order = %claim.order, error = %e, "oracle unavailable, requeueing");
            Resolution::requeue(claim.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicBool, AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use loyalty_store::{AccrualRegistry, HistoryReader, SqliteLedger};
    use loyalty_types::{LoyaltyError, OperationId, OperationStatus, Result, UserId};

    use super::*;
    use crate::oracle::Verdict;

    /// Oracle answering from a fixed table; unknown orders fail.
    struct TableOracle(Mutex<HashMap<String, Verdict>>);

    #[async_trait]
    impl AccrualOracle for TableOracle {
        async fn query(&self, order: &str) -> Result<Verdict> {
            self.0
                .lock()
                .unwrap()
                .get(order)
                .copied()
                .ok_or_else(|| LoyaltyError::OracleTransient {
                    reason: "unknown".into(),
                })
        }
    }

    fn oracle(entries: &[(&str, Verdict)]) -> Arc<TableOracle> {
        Arc::new(TableOracle(Mutex::new(
            entries.iter().map(|(o, v)| ((*o).to_string(), *v)).collect(),
        )))
    }

    struct Fixture {
        ledger: Arc<SqliteLedger>,
        user: UserId,
        tx: mpsc::Sender<ClaimedOrder>,
        stop: watch::Sender<bool>,
        task: tokio::task::JoinHandle<()>,
    }

    /// Oracle whose calls never complete.
    #[derive(Default)]
    struct StuckOracle {
        entered: AtomicBool,
    }

    #[async_trait]
    impl AccrualOracle for StuckOracle {
        async fn query(&self, _order: &str) -> Result<Verdict> {
            self.entered.store(true, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    /// Oracle that marks every order invalid and counts its calls.
    #[derive(Default)]
    struct CountingOracle(AtomicUsize);

    #[async_trait]
    impl AccrualOracle for CountingOracle {
        async fn query(&self, _order: &str) -> Result<Verdict> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Verdict::Invalid)
        }
    }

    /// Ledger whose write-back fails while `down` is set; records batch sizes.
    #[derive(Default)]
    struct FlakyLedger {
        down: AtomicBool,
        attempts: Mutex<Vec<usize>>,
    }

    impl ClaimLedger for FlakyLedger {
        fn claim_new(&self) -> Result<Vec<ClaimedOrder>> {
            Ok(Vec::new())
        }

        fn apply_resolutions(&self, batch: &[Resolution]) -> Result<usize> {
            self.attempts.lock().unwrap().push(batch.len());
            if self.down.load(Ordering::SeqCst) {
                return Err(LoyaltyError::Storage("disk unavailable".into()));
            }
            Ok(batch.len())
        }

        fn requeue_stale(&self, _older_than: Duration) -> Result<usize> {
            Ok(0)
        }
    }

    fn start(orders: &[&str], oracle: Arc<dyn AccrualOracle>, config: PipelineConfig) -> Fixture {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let user = UserId(1);
        for order in orders {
            ledger.register_accrual(user, order).unwrap();
        }
        let (tx, rx) = mpsc::channel(16);
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(Consumer::new(ledger.clone(), oracle, rx, config, shutdown).run());
        Fixture {
            ledger,
            user,
            tx,
            stop,
            task,
        }
    }

    async fn feed_all(f: &Fixture) {
        for claim in f.ledger.claim_new().unwrap() {
            f.tx.send(claim).await.unwrap();
        }
    }

    fn status_of(f: &Fixture, order: &str) -> (OperationStatus, i64) {
        let row = f
            .ledger
            .accruals(f.user)
            .unwrap()
            .into_iter()
            .find(|op| op.order == order)
            .unwrap();
        (row.status, row.sum)
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..500 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn buffer_reports_full_at_threshold() {
        let mut buffer = BatchBuffer::new(2);
        assert!(!buffer.push(Resolution::invalid(loyalty_types::OperationId(1))));
        assert!(buffer.push(Resolution::invalid(loyalty_types::OperationId(2))));
        buffer.consume(2);
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn timer_flushes_terminal_results() {
        let cfg = PipelineConfig {
            flush_interval_ms: 20,
            ..PipelineConfig::default()
        };
        let mut f = start(
            &["12345678903", "79927398713"],
            oracle(&[
                ("12345678903", Verdict::Processed { accrual: 20_000 }),
                ("79927398713", Verdict::Invalid),
            ]),
            cfg,
        );
        feed_all(&f).await;

        eventually(|| f.ledger.count_accruals(OperationStatus::Processing).unwrap() == 0).await;
        assert_eq!(status_of(&f, "12345678903"), (OperationStatus::Processed, 20_000));
        assert_eq!(status_of(&f, "79927398713"), (OperationStatus::Invalid, 0));

        f.stop.send_replace(true);
        (&mut f.task).await.unwrap();
    }

    #[tokio::test]
    async fn pending_and_failed_orders_go_back_to_new() {
        let cfg = PipelineConfig {
            flush_interval_ms: 20,
            ..PipelineConfig::default()
        };
        let mut f = start(
            &["12345678903", "79927398713"],
            oracle(&[("12345678903", Verdict::Pending)]),
            cfg,
        );
        feed_all(&f).await;

        eventually(|| f.ledger.count_accruals(OperationStatus::New).unwrap() == 2).await;
        assert_eq!(status_of(&f, "12345678903"), (OperationStatus::New, 0));

        f.stop.send_replace(true);
        (&mut f.task).await.unwrap();
    }

    #[tokio::test]
    async fn full_batch_flushes_without_timer() {
        let cfg = PipelineConfig {
            flush_interval_ms: 3_600_000,
            batch_size: 2,
            ..PipelineConfig::default()
        };
        let mut f = start(
            &["12345678903", "79927398713"],
            oracle(&[
                ("12345678903", Verdict::Processed { accrual: 1 }),
                ("79927398713", Verdict::Processed { accrual: 2 }),
            ]),
            cfg,
        );
        feed_all(&f).await;

        eventually(|| f.ledger.count_accruals(OperationStatus::Processed).unwrap() == 2).await;
        f.stop.send_replace(true);
        (&mut f.task).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_flushes_buffer_and_requeues_channel() {
        let cfg = PipelineConfig {
            flush_interval_ms: 3_600_000,
            ..PipelineConfig::default()
        };
        let mut f = start(
            &["12345678903"],
            oracle(&[("12345678903", Verdict::Processed { accrual: 7_500 })]),
            cfg,
        );
        feed_all(&f).await;
        // Let the consumer take the claim into its buffer.
        eventually(|| f.tx.capacity() == 16).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        f.stop.send_replace(true);
        (&mut f.task).await.unwrap();
        assert_eq!(status_of(&f, "12345678903"), (OperationStatus::Processed, 7_500));
        assert_eq!(f.ledger.count_accruals(OperationStatus::Processing).unwrap(), 0);
    }

    #[tokio::test]
    async fn claims_left_in_channel_are_requeued_on_shutdown() {
        let cfg = PipelineConfig {
            flush_interval_ms: 3_600_000,
            ..PipelineConfig::default()
        };
        let mut f = start(&["12345678903"], oracle(&[]), cfg);
        // Signal first so the consumer never resolves the claim.
        f.stop.send_replace(true);
        let claims = f.ledger.claim_new().unwrap();
        for claim in claims {
            // The consumer may already have closed the channel.
            if f.tx.send(claim.clone()).await.is_err() {
                f.ledger.apply_resolutions(&[Resolution::requeue(claim.id)]).unwrap();
            }
        }
        (&mut f.task).await.unwrap();
        assert_eq!(status_of(&f, "12345678903"), (OperationStatus::New, 0));
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_stuck_oracle_call() {
        let cfg = PipelineConfig {
            flush_interval_ms: 3_600_000,
            ..PipelineConfig::default()
        };
        let stuck = Arc::new(StuckOracle::default());
        let mut f = start(&["12345678903"], stuck.clone(), cfg);
        feed_all(&f).await;
        eventually(|| stuck.entered.load(Ordering::SeqCst)).await;

        f.stop.send_replace(true);
        tokio::time::timeout(Duration::from_secs(2), &mut f.task)
            .await
            .expect("consumer must not wait for the oracle")
            .unwrap();
        assert_eq!(status_of(&f, "12345678903"), (OperationStatus::New, 0));
    }

    #[tokio::test]
    async fn failed_flush_is_not_retried_per_claim() {
        const CLAIMS: i64 = 5;
        let cfg = PipelineConfig {
            flush_interval_ms: 3_600_000,
            batch_size: 1,
            ..PipelineConfig::default()
        };
        let ledger = Arc::new(FlakyLedger::default());
        ledger.down.store(true, Ordering::SeqCst);
        let oracle = Arc::new(CountingOracle::default());
        let (tx, rx) = mpsc::channel(16);
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(Consumer::new(ledger.clone(), oracle.clone(), rx, cfg, shutdown).run());

        for id in 1..=CLAIMS {
            let claim = ClaimedOrder {
                id: OperationId(id),
                order: format!("order-{id}"),
            };
            tx.send(claim).await.unwrap();
        }
        eventually(|| oracle.0.load(Ordering::SeqCst) == 5).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(ledger.attempts.lock().unwrap().as_slice(), [1]);

        // Storage recovers; the final flush writes everything still buffered.
        ledger.down.store(false, Ordering::SeqCst);
        stop.send_replace(true);
        task.await.unwrap();
        assert_eq!(ledger.attempts.lock().unwrap().as_slice(), [1, 5]);
    }
}
