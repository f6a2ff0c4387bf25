//! Progress events emitted during a crawl.
//!
//! The library reports progress through a callback so that callers choose
//! the presentation; the CLI maps these onto tracing and terminal output.

use std::path::PathBuf;

use crate::records::ResourceKind;

/// A progress event from an in-flight crawl.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CrawlProgress {
    /// Started fetching one resource collection of a repository.
    FetchingResource {
        repository: String,
        kind: ResourceKind,
    },
    /// One page of a collection arrived.
    FetchedPage {
        endpoint: String,
        page: u32,
        count: usize,
        total_so_far: usize,
    },
    /// Finished a collection. `complete` is false when pagination stopped
    /// early after a page could not be fetched.
    FetchComplete {
        repository: String,
        kind: ResourceKind,
        total: usize,
        complete: bool,
    },
    /// A collection turned out to be empty.
    NoRecords {
        repository: String,
        kind: ResourceKind,
    },
    /// Detail statistics resolved for one commit.
    EnrichedCommit {
        repository: String,
        sha: String,
        total_changes: u64,
    },
    /// Rows were appended to a destination file.
    WroteRows { path: PathBuf, rows: usize },
}

/// Callback invoked for each [`CrawlProgress`] event.
pub type ProgressCallback = Box<dyn Fn(CrawlProgress) + Send + Sync>;

/// Invoke an optional callback with an event.
pub fn emit(callback: Option<&ProgressCallback>, event: CrawlProgress) {
    if let Some(cb) = callback {
        cb(event);
    }
}
