//! HTTP client for the accrual oracle with bounded retries.
//!
//! | Response | Handling |
//! |----------|----------|
//! | `200` + JSON for the requested order | verdict |
//! | `200` + JSON for another order | give up this pass |
//! | `204` | unknown order: give up this pass |
//! | `429` | retry after `Retry-After` (capped) |
//! | `5xx`, network error, timeout | retry with exponential backoff |
//! | anything else | give up this pass |
//!
//! Giving up is always `OracleTransient`; the consumer requeues the order.

use std::time::Duration;

use async_trait::async_trait;
use loyalty_types::{LoyaltyError, OracleConfig, Result};
use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode};

use crate::oracle::{AccrualOracle, OracleReply, Verdict};

/// Outcome of a single HTTP attempt.
enum Attempt {
    Done(Verdict),
    Retry { reason: String, after: Option<Duration> },
    GiveUp(String),
}

/// `reqwest`-backed [`AccrualOracle`].
pub struct HttpAccrualOracle {
    client: Client,
    base_url: String,
    config: OracleConfig,
}

impl HttpAccrualOracle {
    /// Build a client for the oracle at `base_url` (e.g. `http://localhost:8080`).
    ///
    /// # Errors
    /// `Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: &str, config: OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| LoyaltyError::Configuration(format!("oracle http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    fn order_url(&self, order: &str) -> String {
        format!("{}/api/orders/{order}", self.base_url)
    }

    async fn attempt(&self, order: &str) -> Attempt {
        let response = match self.client.get(self.order_url(order)).send().await {
            Ok(response) => response,
            Err(e) => {
                return Attempt::Retry {
                    reason: format!("request failed: {e}"),
                    after: None,
                };
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<OracleReply>().await {
                Ok(reply) if reply.order != order => {
                    Attempt::GiveUp(format!("reply is for order {:?}", reply.order))
                }
                Ok(reply) => match reply.verdict() {
                    Ok(verdict) => Attempt::Done(verdict),
                    Err(e) => Attempt::GiveUp(e.to_string()),
                },
                Err(e) => Attempt::GiveUp(format!("malformed reply: {e}")),
            },
            StatusCode::NO_CONTENT => Attempt::GiveUp("order unknown to oracle".into()),
            StatusCode::TOO_MANY_REQUESTS => Attempt::Retry {
                reason: "rate limited".into(),
                after: Some(self.retry_after(&response)),
            },
            status if status.is_server_error() => Attempt::Retry {
                reason: format!("oracle returned {status}"),
                after: None,
            },
            status => Attempt::GiveUp(format!("unexpected status {status}")),
        }
    }

    /// `Retry-After` in seconds, capped; the backoff ceiling if absent.
    fn retry_after(&self, response: &Response) -> Duration {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map_or(self.config.backoff(u32::MAX), Duration::from_secs)
            .min(self.config.max_retry_after())
    }
}

#[async_trait]
impl AccrualOracle for HttpAccrualOracle {
    async fn query(&self, order: &str) -> Result<Verdict> {
        let attempts = self.config.max_attempts.max(1);
        let mut last = String::new();

        for attempt in 1..=attempts {
            match self.attempt(order).await {
                Attempt::Done(verdict) => {
                    tracing::debug!(order, attempt, ?verdict, "oracle answered");
                    return Ok(verdict);
                }
                Attempt::GiveUp(reason) => {
                    tracing::debug!(order, attempt, %reason, "oracle gave no verdict");
                    return Err(LoyaltyError::OracleTransient { reason });
                }
                Attempt::Retry { reason, after } => {
                    tracing::debug!(order, attempt, %reason, "oracle attempt failed");
                    if attempt < attempts {
                        let delay = after.unwrap_or_else(|| self.config.backoff(attempt));
                        tokio::time::sleep(delay).await;
                    }
                    last = reason;
                }
            }
        }

        Err(LoyaltyError::OracleTransient {
            reason: format!("gave up after {attempts} attempts: {last}"),
        })
    }
}
