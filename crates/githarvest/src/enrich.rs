//! Per-commit detail fetch.
//!
//! Listing pages carry no line statistics, so each commit costs one extra
//! request against its detail endpoint. This call site deliberately uses a
//! shorter, fixed-delay retry schedule than page fetches, and exhausting it
//! is fatal for the repository: a commits file with silently missing stats
//! would be worse than no file.

use serde::de::DeserializeOwned;

use crate::cancel::CancelToken;
use crate::client::ApiClient;
use crate::error::{ApiError, EnrichError};
use crate::gate::RateGate;
use crate::records::{last_path_segment, CommitDetail, CommitStats};
use crate::retry::RetryPolicy;

/// Fetches line statistics for individual commits.
pub struct CommitEnricher<'a> {
    client: &'a ApiClient,
    gate: &'a RateGate,
    policy: RetryPolicy,
}

impl<'a> CommitEnricher<'a> {
    pub fn new(client: &'a ApiClient, gate: &'a RateGate) -> Self {
        Self {
            client,
            gate,
            policy: RetryPolicy::detail_fetch(),
        }
    }

    /// Fetch the stats block for one commit of `repo_endpoint`.
    pub async fn enrich(
        &self,
        repo_endpoint: &str,
        sha: &str,
        cancel: &CancelToken,
    ) -> Result<CommitStats, EnrichError> {
        let detail: CommitDetail = self.fetch_detail(repo_endpoint, sha, cancel).await?;
        Ok(detail.stats)
    }

    async fn fetch_detail<T: DeserializeOwned>(
        &self,
        repo_endpoint: &str,
        sha: &str,
        cancel: &CancelToken,
    ) -> Result<T, EnrichError> {
        self.gate.acquire(cancel).await?;

        let url = format!("{repo_endpoint}/commits/{sha}");
        self.client
            .get_json(&url, &[], self.policy, cancel)
            .await
            .map_err(|err| match err {
                ApiError::Cancelled(c) => EnrichError::Cancelled(c),
                other => EnrichError::Failed {
                    repository: last_path_segment(repo_endpoint).to_string(),
                    sha: sha.to_string(),
                    source: other,
                },
            })
    }
}
