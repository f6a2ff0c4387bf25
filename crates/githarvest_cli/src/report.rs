//! Progress reporting via structured logging.

use githarvest::{CrawlProgress, ProgressCallback};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn handle(event: CrawlProgress) {
        match event {
            CrawlProgress::FetchingResource { repository, kind } => {
                tracing::info!(repository = %repository, kind = %kind, "Fetching records");
            }

            CrawlProgress::FetchedPage {
                endpoint,
                page,
                count,
                total_so_far,
            } => {
                tracing::debug!(endpoint = %endpoint, page, count, total_so_far, "Fetched page");
            }

            CrawlProgress::FetchComplete {
                repository,
                kind,
                total,
                complete,
            } => {
                if complete {
                    tracing::info!(repository = %repository, kind = %kind, total, "Fetch complete");
                } else {
                    tracing::warn!(
                        repository = %repository,
                        kind = %kind,
                        total,
                        "Fetch stopped early, keeping partial records"
                    );
                }
            }

            CrawlProgress::NoRecords { repository, kind } => {
                tracing::info!(repository = %repository, kind = %kind, "No records found");
            }

            CrawlProgress::EnrichedCommit {
                repository,
                sha,
                total_changes,
            } => {
                tracing::debug!(repository = %repository, sha = %sha, total_changes, "Enriched commit");
            }

            CrawlProgress::WroteRows { path, rows } => {
                tracing::info!(path = %path.display(), rows, "Wrote rows");
            }

            _ => {}
        }
    }

    /// Wrap the reporter as a crawl progress callback.
    pub fn callback() -> ProgressCallback {
        Box::new(Self::handle)
    }
}
