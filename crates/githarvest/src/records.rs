//! Wire record shapes and CSV row types.
//!
//! Raw types mirror the fields the crawl actually consumes from the API;
//! everything else in the response is ignored. Row types carry the exact
//! column layout of the output files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The resource kinds a crawl can extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Commits,
    Issues,
    Comments,
}

impl ResourceKind {
    /// Fixed page size per kind; never adapted.
    #[must_use]
    pub fn page_size(self) -> u32 {
        match self {
            ResourceKind::Commits => 100,
            ResourceKind::Issues | ResourceKind::Comments => 30,
        }
    }

    /// Resource-specific query parameters, before paging is layered on.
    /// Issues include both open and closed records.
    #[must_use]
    pub fn base_query(self) -> Vec<(String, String)> {
        match self {
            ResourceKind::Issues => vec![("state".to_string(), "all".to_string())],
            ResourceKind::Commits | ResourceKind::Comments => Vec::new(),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Commits => "commits",
            ResourceKind::Issues => "issues",
            ResourceKind::Comments => "comments",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The last path segment of a repository URL is its human-readable name.
#[must_use]
pub fn last_path_segment(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// A user reference as it appears in commit/issue/comment payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct Actor {
    pub login: String,
}

/// One record from a repository's commits collection.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    /// Null when the commit's email does not map to an account.
    pub author: Option<Actor>,
    pub commit: CommitMeta,
}

impl RawCommit {
    /// The account login, or `Unknown` for unattributed commits.
    #[must_use]
    pub fn author_login(&self) -> String {
        self.author
            .as_ref()
            .map(|a| a.login.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitMeta {
    pub author: CommitAuthor,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAuthor {
    pub date: DateTime<Utc>,
}

/// The single-commit detail payload; only the stats block is consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub stats: CommitStats,
}

/// Line-level statistics from the commit detail endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
}

impl CommitStats {
    #[must_use]
    pub fn total_changes(&self) -> u64 {
        self.additions + self.deletions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// One record from a repository's issues collection.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIssue {
    pub repository_url: String,
    pub labels: Vec<Label>,
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub user: Actor,
}

/// One record from an issue's comments collection.
#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    pub user: Actor,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// One row of the commits destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitRow {
    pub repository: String,
    pub sha: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub additions: u64,
    pub deletions: u64,
    pub total_changes: u64,
}

impl CommitRow {
    pub const HEADER: [&'static str; 8] = [
        "Repository",
        "Commit ID",
        "Author",
        "Date",
        "Message",
        "Additions",
        "Deletions",
        "Total Changes",
    ];

    #[must_use]
    pub fn from_parts(repository: &str, commit: &RawCommit, stats: CommitStats) -> Self {
        Self {
            repository: repository.to_string(),
            sha: commit.sha.clone(),
            author: commit.author_login(),
            date: commit.commit.author.date,
            message: commit.commit.message.clone(),
            additions: stats.additions,
            deletions: stats.deletions,
            total_changes: stats.total_changes(),
        }
    }
}

/// One row of the issues destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueRow {
    pub repository: String,
    /// Label names joined with `, `.
    pub labels: String,
    pub id: u64,
    pub title: String,
    pub body: String,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Empty cell for issues that are still open.
    pub closed_at: Option<DateTime<Utc>>,
    pub author: String,
}

impl IssueRow {
    pub const HEADER: [&'static str; 10] = [
        "Repository",
        "Issue Label",
        "Issue ID",
        "Issue Title",
        "Issue Body",
        "State",
        "Created At",
        "Updated At",
        "Closed At",
        "Author",
    ];

    #[must_use]
    pub fn from_raw(issue: &RawIssue) -> Self {
        Self {
            repository: last_path_segment(&issue.repository_url).to_string(),
            labels: issue
                .labels
                .iter()
                .map(|l| l.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            id: issue.number,
            title: issue.title.clone(),
            body: issue.body.clone().unwrap_or_default(),
            state: issue.state,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
            closed_at: issue.closed_at,
            author: issue.user.login.clone(),
        }
    }
}

/// One row of the comments destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRow {
    pub repository: String,
    pub issue_id: u64,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl CommentRow {
    pub const HEADER: [&'static str; 5] = [
        "Repository",
        "Issue ID",
        "Comment Author",
        "Comment Body",
        "Comment Date",
    ];

    #[must_use]
    pub fn from_raw(repository: &str, issue_id: u64, comment: &RawComment) -> Self {
        Self {
            repository: repository.to_string(),
            issue_id,
            author: comment.user.login.clone(),
            body: comment.body.clone(),
            created_at: comment.created_at,
        }
    }
}
