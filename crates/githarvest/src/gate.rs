//! Request-budget gate.
//!
//! The remote budget is the single source of truth: it is re-queried before
//! every gated call rather than decremented locally. That costs one extra
//! request per call but cannot drift out of sync with the server. If
//! repositories are ever crawled concurrently, share one [`RateGate`] across
//! workers so budget waits serialize instead of each worker independently
//! discovering an exhausted budget and sleeping redundantly.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::cancel::{self, CancelToken};
use crate::client::ApiClient;
use crate::error::{ApiError, GateError};
use crate::retry::RetryPolicy;

/// Remote request-budget snapshot.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Budget {
    pub remaining: u64,
    /// Unix timestamp at which the budget replenishes.
    pub reset: i64,
}

impl Budget {
    /// The reset instant as a timestamp; falls back to now for a reset
    /// value outside the representable range.
    #[must_use]
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.reset, 0).unwrap_or_else(Utc::now)
    }
}

/// The budget endpoint nests the core budget under a `rate` key.
#[derive(Debug, Deserialize)]
struct BudgetEnvelope {
    rate: Budget,
}

/// Gate consulted before every API request.
pub struct RateGate {
    client: ApiClient,
    probe: RetryPolicy,
}

impl RateGate {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            probe: RetryPolicy::budget_probe(),
        }
    }

    fn budget_url(&self) -> String {
        format!("{}/rate_limit", self.client.api_base())
    }

    /// Query the current budget, retrying failed probes with backoff.
    ///
    /// Probe failures of any kind are retried; a probe that still fails
    /// after the retry budget is fatal for this gate invocation.
    pub async fn budget(&self, cancel: &CancelToken) -> Result<Budget, GateError> {
        let envelope: BudgetEnvelope = self
            .client
            .get_json_when(
                &self.budget_url(),
                &[],
                self.probe,
                |err: &ApiError| !err.is_cancelled(),
                cancel,
            )
            .await
            .map_err(|err| match err {
                ApiError::Cancelled(c) => GateError::Cancelled(c),
                other => GateError::Budget(other),
            })?;
        Ok(envelope.rate)
    }

    /// Block until at least one request is safe to issue.
    ///
    /// No-op while budget remains; otherwise sleeps out `reset - now`,
    /// clamped at zero, interruptible via `cancel`.
    pub async fn acquire(&self, cancel: &CancelToken) -> Result<(), GateError> {
        let budget = self.budget(cancel).await?;
        if budget.remaining > 0 {
            return Ok(());
        }

        let reset_at = budget.reset_at();
        let wait = (reset_at - Utc::now())
            .to_std()
            .unwrap_or(StdDuration::ZERO);
        if !wait.is_zero() {
            tracing::warn!(
                wait_secs = wait.as_secs(),
                %reset_at,
                "request budget exhausted, waiting for reset"
            );
            cancel::sleep(wait, cancel).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockTransport};
    use std::sync::Arc;
    use std::time::Duration;

    const BUDGET_URL: &str = "https://api.github.com/rate_limit";

    fn gate(transport: &MockTransport) -> RateGate {
        RateGate::new(ApiClient::new(Arc::new(transport.clone()), "test-token"))
    }

    fn budget_json(remaining: u64, reset: i64) -> String {
        format!(r#"{{"rate": {{"limit": 5000, "remaining": {remaining}, "reset": {reset}}}}}"#)
    }

    #[tokio::test]
    async fn acquire_is_a_noop_while_budget_remains() {
        let transport = MockTransport::new();
        transport.push_json(BUDGET_URL, &budget_json(4999, Utc::now().timestamp()));

        gate(&transport)
            .acquire(&CancelToken::new())
            .await
            .expect("gate should open immediately");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_sleeps_until_the_reset_instant() {
        let transport = MockTransport::new();
        let reset = Utc::now().timestamp() + 5;
        transport.push_json(BUDGET_URL, &budget_json(0, reset));

        let started = tokio::time::Instant::now();
        gate(&transport)
            .acquire(&CancelToken::new())
            .await
            .expect("gate should open after the wait");

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "waited {elapsed:?}");
        assert!(elapsed <= Duration::from_secs(6), "waited {elapsed:?}");
    }

    #[tokio::test]
    async fn acquire_never_sleeps_on_a_reset_in_the_past() {
        let transport = MockTransport::new();
        transport.push_json(BUDGET_URL, &budget_json(0, Utc::now().timestamp() - 60));

        gate(&transport)
            .acquire(&CancelToken::new())
            .await
            .expect("an elapsed reset means the budget is already fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn budget_probe_retries_failures_then_succeeds() {
        let transport = MockTransport::new();
        transport.push_response(BUDGET_URL, HttpResponse::new(500, Vec::new()));
        transport.push_transport_error(BUDGET_URL, "connection reset");
        transport.push_json(BUDGET_URL, &budget_json(10, Utc::now().timestamp()));

        gate(&transport)
            .acquire(&CancelToken::new())
            .await
            .expect("third probe should succeed");
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_probe_exhaustion_is_fatal() {
        let transport = MockTransport::new();
        for _ in 0..3 {
            transport.push_transport_error(BUDGET_URL, "connection reset");
        }

        let err = gate(&transport)
            .acquire(&CancelToken::new())
            .await
            .expect_err("probe exhaustion should surface");
        assert!(matches!(err, GateError::Budget(_)));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_wait_is_interruptible() {
        let transport = MockTransport::new();
        let reset = Utc::now().timestamp() + 3600;
        transport.push_json(BUDGET_URL, &budget_json(0, reset));

        let cancel = CancelToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = gate(&transport)
            .acquire(&cancel)
            .await
            .expect_err("cancellation should interrupt the budget wait");
        assert!(matches!(err, GateError::Cancelled(_)));
        assert!(started.elapsed() < Duration::from_secs(3600));
    }
}
