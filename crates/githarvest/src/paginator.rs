//! Sequential page walker for paged collections.
//!
//! Pages are numbered from 1 and fetched one at a time; the only terminal
//! signal is an empty page. A page that cannot be fetched even after retries
//! ends the walk early with whatever accumulated so far, marked truncated.

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::client::ApiClient;
use crate::error::{ApiError, GateError};
use crate::gate::RateGate;
use crate::progress::{emit, CrawlProgress, ProgressCallback};
use crate::retry::RetryPolicy;

/// The outcome of walking one collection.
#[derive(Debug)]
pub struct FetchOutcome<T> {
    pub records: Vec<T>,
    /// Non-empty pages consumed.
    pub pages: u32,
    /// Set when the walk stopped before a natural empty-page end.
    pub truncated: Option<ApiError>,
}

impl<T> FetchOutcome<T> {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.truncated.is_none()
    }
}

/// Walks a paged collection page by page, consulting the gate before each
/// page request.
pub struct Paginator<'a> {
    client: &'a ApiClient,
    gate: &'a RateGate,
    policy: RetryPolicy,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a ApiClient, gate: &'a RateGate) -> Self {
        Self {
            client,
            gate,
            policy: RetryPolicy::page_fetch(),
        }
    }

    /// Fetch every page of `endpoint` until an empty page.
    ///
    /// A page request that fails past its retry budget is tolerated: the
    /// walk stops and returns the records gathered so far with `truncated`
    /// set. Budget-probe failure and cancellation are fatal.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        base_query: &[(String, String)],
        page_size: u32,
        cancel: &CancelToken,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<FetchOutcome<T>, GateError> {
        let mut records: Vec<T> = Vec::new();
        let mut pages = 0u32;
        let mut page = 1u32;

        loop {
            self.gate.acquire(cancel).await?;

            let mut query = base_query.to_vec();
            query.push(("page".to_string(), page.to_string()));
            query.push(("per_page".to_string(), page_size.to_string()));

            let batch: Vec<T> = match self
                .client
                .get_json(endpoint, &query, self.policy, cancel)
                .await
            {
                Ok(batch) => batch,
                Err(ApiError::Cancelled(c)) => return Err(GateError::Cancelled(c)),
                Err(err) => {
                    warn!(
                        endpoint,
                        page,
                        error = %err,
                        "page fetch failed, keeping records gathered so far"
                    );
                    return Ok(FetchOutcome {
                        records,
                        pages,
                        truncated: Some(err),
                    });
                }
            };

            if batch.is_empty() {
                return Ok(FetchOutcome {
                    records,
                    pages,
                    truncated: None,
                });
            }

            pages += 1;
            let count = batch.len();
            records.extend(batch);
            emit(
                on_progress,
                CrawlProgress::FetchedPage {
                    endpoint: endpoint.to_string(),
                    page,
                    count,
                    total_so_far: records.len(),
                },
            );
            page += 1;
        }
    }
}
