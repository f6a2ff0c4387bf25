//! Crawl orchestration.
//!
//! A crawl walks each repository's selected collections in a fixed order:
//! commits, then issues, then the comments of those issues. Comments reuse
//! the issue records from the same run, so selecting comments always fetches
//! issues even when no issue rows are written.

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::client::ApiClient;
use crate::enrich::CommitEnricher;
use crate::error::CrawlError;
use crate::gate::RateGate;
use crate::paginator::{FetchOutcome, Paginator};
use crate::progress::{emit, CrawlProgress, ProgressCallback};
use crate::records::{
    last_path_segment, CommentRow, CommitRow, IssueRow, RawComment, RawCommit, RawIssue,
    ResourceKind,
};
use crate::sink::CsvSink;

/// Which collections a run extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Commits,
    Issues,
    Comments,
    All,
}

impl Selection {
    #[must_use]
    pub fn includes(self, kind: ResourceKind) -> bool {
        match self {
            Selection::All => true,
            Selection::Commits => kind == ResourceKind::Commits,
            Selection::Issues => kind == ResourceKind::Issues,
            Selection::Comments => kind == ResourceKind::Comments,
        }
    }
}

/// The destination files for one run.
#[derive(Debug, Clone)]
pub struct OutputSet {
    pub commits: CsvSink,
    pub issues: CsvSink,
    pub comments: CsvSink,
}

impl OutputSet {
    /// Truncate the destinations the selection writes to.
    pub fn reset_selected(&self, selection: Selection) -> Result<(), CrawlError> {
        if selection.includes(ResourceKind::Commits) {
            self.commits.reset().map_err(CrawlError::Sink)?;
        }
        if selection.includes(ResourceKind::Issues) {
            self.issues.reset().map_err(CrawlError::Sink)?;
        }
        if selection.includes(ResourceKind::Comments) {
            self.comments.reset().map_err(CrawlError::Sink)?;
        }
        Ok(())
    }
}

/// Row counts and non-fatal trouble from one repository.
#[derive(Debug, Default)]
pub struct CrawlResult {
    pub commits: usize,
    pub issues: usize,
    pub comments: usize,
    /// Collections that ended early; the rows written before the failure
    /// are kept.
    pub errors: Vec<String>,
}

/// Per-repository outcome of a multi-repository run.
#[derive(Debug)]
pub struct RepositoryReport {
    pub repository: String,
    pub outcome: Result<CrawlResult, CrawlError>,
}

/// Drives the gate, paginator, enricher and sinks for whole repositories.
pub struct Crawler {
    client: ApiClient,
    gate: RateGate,
}

impl Crawler {
    pub fn new(client: ApiClient) -> Self {
        let gate = RateGate::new(client.clone());
        Self { client, gate }
    }

    fn repo_endpoint(&self, repo: &str) -> String {
        format!("{}/repos/{}", self.client.api_base(), repo)
    }

    /// Extract the selected collections of one `owner/name` repository.
    pub async fn crawl_repository(
        &self,
        repo: &str,
        selection: Selection,
        outputs: &OutputSet,
        cancel: &CancelToken,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<CrawlResult, CrawlError> {
        let endpoint = self.repo_endpoint(repo);
        let name = last_path_segment(repo).to_string();
        let mut result = CrawlResult::default();

        if selection.includes(ResourceKind::Commits) {
            self.crawl_commits(&endpoint, &name, outputs, cancel, on_progress, &mut result)
                .await?;
        }

        let needs_issues = selection.includes(ResourceKind::Issues)
            || selection.includes(ResourceKind::Comments);
        if needs_issues {
            let issues = self
                .fetch_issues(&endpoint, &name, cancel, on_progress, &mut result)
                .await?;

            if selection.includes(ResourceKind::Issues) {
                let rows: Vec<IssueRow> = issues.iter().map(IssueRow::from_raw).collect();
                outputs
                    .issues
                    .write(&IssueRow::HEADER, &rows)
                    .map_err(CrawlError::Sink)?;
                result.issues = rows.len();
                emit(
                    on_progress,
                    CrawlProgress::WroteRows {
                        path: outputs.issues.path().to_path_buf(),
                        rows: rows.len(),
                    },
                );
            }

            if selection.includes(ResourceKind::Comments) {
                self.crawl_comments(
                    &endpoint,
                    &name,
                    &issues,
                    outputs,
                    cancel,
                    on_progress,
                    &mut result,
                )
                .await?;
            }
        }

        info!(
            repository = %name,
            commits = result.commits,
            issues = result.issues,
            comments = result.comments,
            "repository crawl finished"
        );
        Ok(result)
    }

    async fn crawl_commits(
        &self,
        endpoint: &str,
        name: &str,
        outputs: &OutputSet,
        cancel: &CancelToken,
        on_progress: Option<&ProgressCallback>,
        result: &mut CrawlResult,
    ) -> Result<(), CrawlError> {
        emit(
            on_progress,
            CrawlProgress::FetchingResource {
                repository: name.to_string(),
                kind: ResourceKind::Commits,
            },
        );

        let paginator = Paginator::new(&self.client, &self.gate);
        let outcome: FetchOutcome<RawCommit> = paginator
            .fetch_all(
                &format!("{endpoint}/commits"),
                &ResourceKind::Commits.base_query(),
                ResourceKind::Commits.page_size(),
                cancel,
                on_progress,
            )
            .await
            .map_err(CrawlError::Gate)?;
        self.note_outcome(&outcome, name, ResourceKind::Commits, on_progress, result);

        if outcome.records.is_empty() {
            return Ok(());
        }

        let enricher = CommitEnricher::new(&self.client, &self.gate);
        for commit in &outcome.records {
            let stats = enricher
                .enrich(endpoint, &commit.sha, cancel)
                .await
                .map_err(CrawlError::Enrich)?;
            emit(
                on_progress,
                CrawlProgress::EnrichedCommit {
                    repository: name.to_string(),
                    sha: commit.sha.clone(),
                    total_changes: stats.total_changes(),
                },
            );
            // Each row lands in the file before the next enrichment, so a
            // fatal enrichment failure keeps the rows already resolved.
            outputs
                .commits
                .write(&CommitRow::HEADER, &[CommitRow::from_parts(name, commit, stats)])
                .map_err(CrawlError::Sink)?;
            result.commits += 1;
        }

        emit(
            on_progress,
            CrawlProgress::WroteRows {
                path: outputs.commits.path().to_path_buf(),
                rows: result.commits,
            },
        );
        Ok(())
    }

    async fn fetch_issues(
        &self,
        endpoint: &str,
        name: &str,
        cancel: &CancelToken,
        on_progress: Option<&ProgressCallback>,
        result: &mut CrawlResult,
    ) -> Result<Vec<RawIssue>, CrawlError> {
        emit(
            on_progress,
            CrawlProgress::FetchingResource {
                repository: name.to_string(),
                kind: ResourceKind::Issues,
            },
        );

        let paginator = Paginator::new(&self.client, &self.gate);
        let outcome: FetchOutcome<RawIssue> = paginator
            .fetch_all(
                &format!("{endpoint}/issues"),
                &ResourceKind::Issues.base_query(),
                ResourceKind::Issues.page_size(),
                cancel,
                on_progress,
            )
            .await
            .map_err(CrawlError::Gate)?;
        self.note_outcome(&outcome, name, ResourceKind::Issues, on_progress, result);
        Ok(outcome.records)
    }

    async fn crawl_comments(
        &self,
        endpoint: &str,
        name: &str,
        issues: &[RawIssue],
        outputs: &OutputSet,
        cancel: &CancelToken,
        on_progress: Option<&ProgressCallback>,
        result: &mut CrawlResult,
    ) -> Result<(), CrawlError> {
        emit(
            on_progress,
            CrawlProgress::FetchingResource {
                repository: name.to_string(),
                kind: ResourceKind::Comments,
            },
        );

        let paginator = Paginator::new(&self.client, &self.gate);
        for issue in issues {
            let outcome: FetchOutcome<RawComment> = paginator
                .fetch_all(
                    &format!("{endpoint}/issues/{}/comments", issue.number),
                    &ResourceKind::Comments.base_query(),
                    ResourceKind::Comments.page_size(),
                    cancel,
                    on_progress,
                )
                .await
                .map_err(CrawlError::Gate)?;
            if let Some(err) = &outcome.truncated {
                result.errors.push(format!(
                    "{name} issue #{} comments incomplete: {err}",
                    issue.number
                ));
            }
            if outcome.records.is_empty() {
                continue;
            }

            let rows: Vec<CommentRow> = outcome
                .records
                .iter()
                .map(|c| CommentRow::from_raw(name, issue.number, c))
                .collect();
            outputs
                .comments
                .write(&CommentRow::HEADER, &rows)
                .map_err(CrawlError::Sink)?;
            result.comments += rows.len();
        }

        emit(
            on_progress,
            CrawlProgress::FetchComplete {
                repository: name.to_string(),
                kind: ResourceKind::Comments,
                total: result.comments,
                complete: true,
            },
        );
        if result.comments > 0 {
            emit(
                on_progress,
                CrawlProgress::WroteRows {
                    path: outputs.comments.path().to_path_buf(),
                    rows: result.comments,
                },
            );
        }
        Ok(())
    }

    fn note_outcome<T>(
        &self,
        outcome: &FetchOutcome<T>,
        name: &str,
        kind: ResourceKind,
        on_progress: Option<&ProgressCallback>,
        result: &mut CrawlResult,
    ) {
        if let Some(err) = &outcome.truncated {
            result
                .errors
                .push(format!("{name} {kind} listing incomplete: {err}"));
        }
        if outcome.records.is_empty() {
            emit(
                on_progress,
                CrawlProgress::NoRecords {
                    repository: name.to_string(),
                    kind,
                },
            );
        } else {
            emit(
                on_progress,
                CrawlProgress::FetchComplete {
                    repository: name.to_string(),
                    kind,
                    total: outcome.records.len(),
                    complete: outcome.is_complete(),
                },
            );
        }
    }

    /// Crawl each repository in turn. A failed repository is recorded and
    /// the run moves on; cancellation stops the run where it stands.
    pub async fn crawl_all(
        &self,
        repos: &[String],
        selection: Selection,
        outputs: &OutputSet,
        cancel: &CancelToken,
        on_progress: Option<&ProgressCallback>,
    ) -> Vec<RepositoryReport> {
        let mut reports = Vec::with_capacity(repos.len());
        for repo in repos {
            let outcome = self
                .crawl_repository(repo, selection, outputs, cancel, on_progress)
                .await;
            let abort = matches!(&outcome, Err(err) if err.is_cancelled());
            if let Err(err) = &outcome {
                if abort {
                    warn!(repository = %repo, "crawl cancelled");
                } else {
                    warn!(repository = %repo, error = %err, "repository crawl failed");
                }
            }
            reports.push(RepositoryReport {
                repository: repo.clone(),
                outcome,
            });
            if abort {
                break;
            }
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_includes_each_kind() {
        assert!(Selection::All.includes(ResourceKind::Commits));
        assert!(Selection::All.includes(ResourceKind::Comments));
        assert!(Selection::Commits.includes(ResourceKind::Commits));
        assert!(!Selection::Commits.includes(ResourceKind::Issues));
        assert!(Selection::Comments.includes(ResourceKind::Comments));
        assert!(!Selection::Comments.includes(ResourceKind::Issues));
    }

    #[test]
    fn reset_selected_touches_only_selected_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outputs = OutputSet {
            commits: CsvSink::new(dir.path().join("commits.csv")),
            issues: CsvSink::new(dir.path().join("issues.csv")),
            comments: CsvSink::new(dir.path().join("comments.csv")),
        };
        std::fs::write(outputs.commits.path(), "old").expect("seed commits");
        std::fs::write(outputs.issues.path(), "old").expect("seed issues");

        outputs
            .reset_selected(Selection::Commits)
            .expect("reset commits");

        assert_eq!(
            std::fs::metadata(outputs.commits.path()).unwrap().len(),
            0
        );
        assert_eq!(std::fs::metadata(outputs.issues.path()).unwrap().len(), 3);
        assert!(!outputs.comments.path().exists());
    }
}
