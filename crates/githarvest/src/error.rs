//! Error taxonomy for the crawl engine.
//!
//! Each layer has its own error enum; failure policy lives at the call
//! sites. Pagination tolerates a terminal [`ApiError`] by returning partial
//! results, while enrichment escalates the same error into an
//! [`EnrichError`] that aborts the repository.

use thiserror::Error;

use crate::cancel::Cancelled;

/// Errors from a single resilient-transport call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection-level failure (DNS, reset, timeout). Retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// A non-2xx status. Only 403/429 are treated as transient throttling.
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// The body could not be decoded as the expected JSON shape. Terminal
    /// for the call; the raw body is logged at the failure site.
    #[error("undecodable response body from {url}: {message}")]
    Decode { url: String, message: String },

    /// The retry budget for one call ran out.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: Box<ApiError>,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl ApiError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled(_))
    }
}

/// Errors from acquiring the rate gate.
#[derive(Debug, Error)]
pub enum GateError {
    /// The budget endpoint could not be queried even after retries. Fatal
    /// for this gate invocation.
    #[error("budget query failed: {0}")]
    Budget(#[source] ApiError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Errors from enriching one commit with line statistics.
///
/// Enrichment failure is fatal for the repository's remaining commits; a
/// missing detail record would otherwise produce an output row with
/// undefined statistics.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("commit stats fetch failed for {repository}@{sha}: {source}")]
    Failed {
        repository: String,
        sha: String,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

/// Errors from the CSV record sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors that abort the crawl of one repository.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl CrawlError {
    /// True when the failure came from a shutdown request rather than the
    /// remote side; cancellation aborts the whole run, not just one repo.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            CrawlError::Cancelled(_) => true,
            CrawlError::Gate(GateError::Cancelled(_)) => true,
            CrawlError::Enrich(EnrichError::Cancelled(_)) => true,
            CrawlError::Enrich(EnrichError::Gate(GateError::Cancelled(_))) => true,
            _ => false,
        }
    }
}
