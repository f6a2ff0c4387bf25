//! Repository-history extraction for GitHub.
//!
//! `githarvest` walks a repository's commits, issues and issue comments
//! through the paginated REST API and appends them to CSV files. Every API
//! call is preceded by a fresh query of the remote request budget, transient
//! failures are retried with backoff, and every wait can be interrupted
//! through a [`cancel::CancelToken`].
//!
//! The pieces compose bottom-up: [`http`] abstracts the transport,
//! [`client`] layers authentication and retry classification on top,
//! [`gate`] holds calls until budget is available, [`paginator`] and
//! [`enrich`] fetch collections and per-commit detail, [`sink`] persists
//! rows, and [`crawl`] orchestrates whole repositories.

pub mod cancel;
pub mod client;
pub mod crawl;
pub mod enrich;
pub mod error;
pub mod gate;
pub mod http;
pub mod paginator;
pub mod progress;
pub mod records;
pub mod retry;
pub mod sink;

pub use cancel::CancelToken;
pub use client::ApiClient;
pub use crawl::{CrawlResult, Crawler, OutputSet, RepositoryReport, Selection};
pub use error::{ApiError, CrawlError, EnrichError, GateError, SinkError};
pub use http::{HttpTransport, ReqwestTransport};
pub use progress::{CrawlProgress, ProgressCallback};
pub use records::ResourceKind;
pub use sink::CsvSink;
