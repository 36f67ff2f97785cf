//! Shared handler state.

use std::sync::Arc;

use loyalty_ingress::{BalanceCalculator, OrderHistory, SubmissionGate, WithdrawalGuard};
use loyalty_store::{AccrualRegistry, BalanceReader, HistoryReader, WithdrawalLedger};
use loyalty_types::{LoyaltyError, Result};

/// The request-plane components, built once over the shared ledger.
pub struct Services {
    pub submissions: SubmissionGate,
    pub withdrawals: WithdrawalGuard,
    pub balances: BalanceCalculator,
    pub history: OrderHistory,
}

/// Cheaply clonable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    services: Arc<Services>,
}

impl AppState {
    /// Wire every component to the same ledger handle.
    pub fn new<L>(ledger: Arc<L>) -> Self
    where
        L: AccrualRegistry + WithdrawalLedger + BalanceReader + HistoryReader + 'static,
    {
        Self::from_services(Services {
            submissions: SubmissionGate::new(ledger.clone()),
            withdrawals: WithdrawalGuard::new(ledger.clone()),
            balances: BalanceCalculator::new(ledger.clone()),
            history: OrderHistory::new(ledger),
        })
    }

    #[must_use]
    pub fn from_services(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    /// Run `f` against the services on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Services) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let services = Arc::clone(&self.services);
        tokio::task::spawn_blocking(move || f(&services))
            .await
            .map_err(|e| LoyaltyError::Internal(format!("request task failed: {e}")))?
    }
}
