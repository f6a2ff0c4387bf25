//! Shared retry utilities.
//!
//! One [`RetryPolicy`] type covers every retrying call site; the
//! retryable-condition predicate is supplied per call, since pagination and
//! enrichment classify failures differently. Delay schedules come from
//! `backon`'s builders, but the sleeps themselves run through the
//! cancellable wait in [`crate::cancel`] so shutdown can interrupt them.

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder};
use thiserror::Error;

use crate::cancel::{self, CancelToken, Cancelled};

/// How successive retry delays are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Delay doubles each attempt, starting at `base`.
    Exponential { base: Duration },
    /// The same delay between every attempt.
    Fixed { delay: Duration },
}

/// Attempt budget plus backoff schedule for one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff: Backoff,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: usize, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Collection page fetches: 5 attempts, exponential backoff from 1s.
    #[must_use]
    pub fn page_fetch() -> Self {
        Self::new(
            5,
            Backoff::Exponential {
                base: Duration::from_secs(1),
            },
        )
    }

    /// Commit-detail fetches: 3 attempts with a fixed 5s delay. Deliberately
    /// not exponential; this asymmetry with page fetches is part of the
    /// contract, not an accident.
    #[must_use]
    pub fn detail_fetch() -> Self {
        Self::new(
            3,
            Backoff::Fixed {
                delay: Duration::from_secs(5),
            },
        )
    }

    /// Budget-endpoint probes: 3 attempts, exponential backoff 1s then 2s.
    #[must_use]
    pub fn budget_probe() -> Self {
        Self::new(
            3,
            Backoff::Exponential {
                base: Duration::from_secs(1),
            },
        )
    }

    /// Delays slept between attempts; `max_attempts - 1` entries.
    #[must_use]
    pub fn delays(&self) -> Vec<Duration> {
        let times = self.max_attempts.saturating_sub(1);
        match self.backoff {
            Backoff::Exponential { base } => ExponentialBuilder::default()
                .with_min_delay(base)
                .with_factor(2.0)
                .with_max_times(times)
                .build()
                .collect(),
            Backoff::Fixed { delay } => ConstantBuilder::default()
                .with_delay(delay)
                .with_max_times(times)
                .build()
                .collect(),
        }
    }
}

/// Why a retried operation ultimately failed.
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error> {
    /// The error was not retryable; it surfaced on the attempt it occurred.
    #[error(transparent)]
    Terminal(E),

    /// Every attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: E },

    #[error(transparent)]
    Cancelled(Cancelled),
}

/// Run `operation` under `policy`, retrying only errors `when` accepts.
pub async fn retry<T, E, F, Fut, When>(
    policy: RetryPolicy,
    cancel: &CancelToken,
    mut operation: F,
    when: When,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error,
    When: Fn(&E) -> bool,
{
    if cancel.is_cancelled() {
        return Err(RetryError::Cancelled(Cancelled));
    }

    let mut delays = policy.delays().into_iter();
    let mut attempt = 1usize;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if when(&err) => match delays.next() {
                Some(delay) => {
                    tracing::debug!(attempt, ?delay, error = %err, "transient failure, retrying");
                    cancel::sleep(delay, cancel)
                        .await
                        .map_err(RetryError::Cancelled)?;
                    attempt += 1;
                }
                None => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
            },
            Err(err) => return Err(RetryError::Terminal(err)),
        }
    }
}
