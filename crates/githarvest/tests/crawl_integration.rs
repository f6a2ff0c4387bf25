//! End-to-end crawl against a canned transport.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use githarvest::cancel::CancelToken;
use githarvest::client::ApiClient;
use githarvest::crawl::{Crawler, OutputSet, Selection};
use githarvest::error::CrawlError;
use githarvest::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};
use githarvest::sink::CsvSink;

const API_BASE: &str = "https://api.example.test";

/// Serves the same canned response every time a URL is requested.
#[derive(Clone, Default)]
struct StubTransport {
    routes: Arc<Mutex<HashMap<String, HttpResponse>>>,
}

impl StubTransport {
    fn new() -> Self {
        Self::default()
    }

    fn route(&self, url: impl Into<String>, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.into(), HttpResponse::new(status, body.as_bytes().to_vec()));
    }
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let url = request.full_url();
        self.routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or(HttpError::NoMockResponse { url })
    }
}

fn fixture_transport() -> StubTransport {
    let t = StubTransport::new();
    let repo = format!("{API_BASE}/repos/acme/widgets");

    t.route(
        &format!("{API_BASE}/rate_limit"),
        200,
        r#"{"rate": {"remaining": 100, "reset": 0}}"#,
    );

    t.route(
        &format!("{repo}/commits?page=1&per_page=100"),
        200,
        r#"[
            {
                "sha": "c1sha",
                "author": {"login": "alice"},
                "commit": {"author": {"date": "2024-03-01T12:00:00Z"}, "message": "first commit"}
            },
            {
                "sha": "c2sha",
                "author": null,
                "commit": {"author": {"date": "2024-03-02T09:30:00Z"}, "message": "second commit"}
            }
        ]"#,
    );
    t.route(&format!("{repo}/commits?page=2&per_page=100"), 200, "[]");
    t.route(
        &format!("{repo}/commits/c1sha"),
        200,
        r#"{"stats": {"additions": 10, "deletions": 2}}"#,
    );
    t.route(
        &format!("{repo}/commits/c2sha"),
        200,
        r#"{"stats": {"additions": 0, "deletions": 5}}"#,
    );

    t.route(
        &format!("{repo}/issues?state=all&page=1&per_page=30"),
        200,
        r#"[
            {
                "repository_url": "https://api.example.test/repos/acme/widgets",
                "labels": [{"name": "bug"}, {"name": "p1"}],
                "number": 1,
                "title": "Broken widget",
                "body": "It breaks",
                "state": "open",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-02T00:00:00Z",
                "closed_at": null,
                "user": {"login": "alice"}
            },
            {
                "repository_url": "https://api.example.test/repos/acme/widgets",
                "labels": [],
                "number": 2,
                "title": "Feature request",
                "body": null,
                "state": "closed",
                "created_at": "2024-01-03T00:00:00Z",
                "updated_at": "2024-01-04T00:00:00Z",
                "closed_at": "2024-01-05T00:00:00Z",
                "user": {"login": "bob"}
            }
        ]"#,
    );
    t.route(&format!("{repo}/issues?state=all&page=2&per_page=30"), 200, "[]");

    t.route(
        &format!("{repo}/issues/1/comments?page=1&per_page=30"),
        200,
        r#"[{"user": {"login": "carol"}, "body": "me too", "created_at": "2024-01-06T00:00:00Z"}]"#,
    );
    t.route(&format!("{repo}/issues/1/comments?page=2&per_page=30"), 200, "[]");
    t.route(
        &format!("{repo}/issues/2/comments?page=1&per_page=30"),
        200,
        r#"[{"user": {"login": "dave"}, "body": "done", "created_at": "2024-01-07T00:00:00Z"}]"#,
    );
    t.route(&format!("{repo}/issues/2/comments?page=2&per_page=30"), 200, "[]");

    t
}

fn crawler(transport: &StubTransport) -> Crawler {
    let client =
        ApiClient::new(Arc::new(transport.clone()), "test-token").with_api_base(API_BASE);
    Crawler::new(client)
}

fn outputs(dir: &tempfile::TempDir) -> OutputSet {
    OutputSet {
        commits: CsvSink::new(dir.path().join("commits.csv")),
        issues: CsvSink::new(dir.path().join("issues.csv")),
        comments: CsvSink::new(dir.path().join("comments.csv")),
    }
}

const COMMITS_CSV: &str = "\
Repository,Commit ID,Author,Date,Message,Additions,Deletions,Total Changes
widgets,c1sha,alice,2024-03-01T12:00:00Z,first commit,10,2,12
widgets,c2sha,Unknown,2024-03-02T09:30:00Z,second commit,0,5,5
";

const ISSUES_CSV: &str = "\
Repository,Issue Label,Issue ID,Issue Title,Issue Body,State,Created At,Updated At,Closed At,Author
widgets,\"bug, p1\",1,Broken widget,It breaks,open,2024-01-01T00:00:00Z,2024-01-02T00:00:00Z,,alice
widgets,,2,Feature request,,closed,2024-01-03T00:00:00Z,2024-01-04T00:00:00Z,2024-01-05T00:00:00Z,bob
";

const COMMENTS_CSV: &str = "\
Repository,Issue ID,Comment Author,Comment Body,Comment Date
widgets,1,carol,me too,2024-01-06T00:00:00Z
widgets,2,dave,done,2024-01-07T00:00:00Z
";

#[tokio::test]
async fn full_crawl_writes_all_three_files() {
    let transport = fixture_transport();
    let crawler = crawler(&transport);
    let dir = tempfile::tempdir().expect("tempdir");
    let outputs = outputs(&dir);

    let result = crawler
        .crawl_repository(
            "acme/widgets",
            Selection::All,
            &outputs,
            &CancelToken::new(),
            None,
        )
        .await
        .expect("crawl should succeed");

    assert_eq!(result.commits, 2);
    assert_eq!(result.issues, 2);
    assert_eq!(result.comments, 2);
    assert!(result.errors.is_empty());

    let commits = std::fs::read_to_string(outputs.commits.path()).expect("commits file");
    let issues = std::fs::read_to_string(outputs.issues.path()).expect("issues file");
    let comments = std::fs::read_to_string(outputs.comments.path()).expect("comments file");
    assert_eq!(commits, COMMITS_CSV);
    assert_eq!(issues, ISSUES_CSV);
    assert_eq!(comments, COMMENTS_CSV);
}

#[tokio::test]
async fn rerun_appends_without_a_second_header() {
    let transport = fixture_transport();
    let crawler = crawler(&transport);
    let dir = tempfile::tempdir().expect("tempdir");
    let outputs = outputs(&dir);
    let cancel = CancelToken::new();

    for _ in 0..2 {
        crawler
            .crawl_repository("acme/widgets", Selection::Commits, &outputs, &cancel, None)
            .await
            .expect("crawl should succeed");
    }

    let commits = std::fs::read_to_string(outputs.commits.path()).expect("commits file");
    let header_count = commits
        .lines()
        .filter(|l| l.starts_with("Repository,"))
        .count();
    assert_eq!(header_count, 1);
    assert_eq!(commits.lines().count(), 5);
}

#[tokio::test]
async fn reset_before_rerun_replaces_the_file() {
    let transport = fixture_transport();
    let crawler = crawler(&transport);
    let dir = tempfile::tempdir().expect("tempdir");
    let outputs = outputs(&dir);
    let cancel = CancelToken::new();

    crawler
        .crawl_repository("acme/widgets", Selection::Commits, &outputs, &cancel, None)
        .await
        .expect("first run");
    outputs
        .reset_selected(Selection::Commits)
        .expect("reset");
    crawler
        .crawl_repository("acme/widgets", Selection::Commits, &outputs, &cancel, None)
        .await
        .expect("second run");

    let commits = std::fs::read_to_string(outputs.commits.path()).expect("commits file");
    assert_eq!(commits, COMMITS_CSV);
}

#[tokio::test]
async fn commits_selection_leaves_other_files_untouched() {
    let transport = fixture_transport();
    let crawler = crawler(&transport);
    let dir = tempfile::tempdir().expect("tempdir");
    let outputs = outputs(&dir);

    let result = crawler
        .crawl_repository(
            "acme/widgets",
            Selection::Commits,
            &outputs,
            &CancelToken::new(),
            None,
        )
        .await
        .expect("crawl should succeed");

    assert_eq!(result.commits, 2);
    assert_eq!(result.issues, 0);
    assert!(outputs.commits.path().exists());
    assert!(!outputs.issues.path().exists());
    assert!(!outputs.comments.path().exists());
}

#[tokio::test]
async fn failed_enrichment_keeps_rows_already_written() {
    let transport = fixture_transport();
    let repo = format!("{API_BASE}/repos/acme/widgets");
    // The second commit's detail endpoint rejects the request outright.
    transport.route(&format!("{repo}/commits/c2sha"), 422, "unprocessable");

    let crawler = crawler(&transport);
    let dir = tempfile::tempdir().expect("tempdir");
    let outputs = outputs(&dir);

    let err = crawler
        .crawl_repository(
            "acme/widgets",
            Selection::Commits,
            &outputs,
            &CancelToken::new(),
            None,
        )
        .await
        .expect_err("a commit without stats fails the repository");
    assert!(matches!(err, CrawlError::Enrich(_)));

    // The first commit was enriched and written before the failure.
    let commits = std::fs::read_to_string(outputs.commits.path()).expect("commits file");
    assert_eq!(
        commits,
        "Repository,Commit ID,Author,Date,Message,Additions,Deletions,Total Changes\n\
         widgets,c1sha,alice,2024-03-01T12:00:00Z,first commit,10,2,12\n"
    );
}

#[tokio::test(start_paused = true)]
async fn truncated_issue_listing_keeps_earlier_pages() {
    let transport = fixture_transport();
    let repo = format!("{API_BASE}/repos/acme/widgets");
    // Second issues page persistently fails; the first page still lands.
    transport.route(
        &format!("{repo}/issues?state=all&page=2&per_page=30"),
        500,
        "server error",
    );

    let crawler = crawler(&transport);
    let dir = tempfile::tempdir().expect("tempdir");
    let outputs = outputs(&dir);

    let result = crawler
        .crawl_repository(
            "acme/widgets",
            Selection::Issues,
            &outputs,
            &CancelToken::new(),
            None,
        )
        .await
        .expect("truncation is tolerated");

    assert_eq!(result.issues, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("issues"));

    let issues = std::fs::read_to_string(outputs.issues.path()).expect("issues file");
    assert_eq!(issues, ISSUES_CSV);
}

#[tokio::test(start_paused = true)]
async fn crawl_all_records_per_repository_failures_and_continues() {
    let transport = fixture_transport();
    // No routes for acme/gadgets: its commit listing fails outright, which
    // surfaces as a truncated-but-empty fetch rather than a run abort.
    let crawler = crawler(&transport);
    let dir = tempfile::tempdir().expect("tempdir");
    let outputs = outputs(&dir);

    let repos = vec!["acme/gadgets".to_string(), "acme/widgets".to_string()];
    let reports = crawler
        .crawl_all(
            &repos,
            Selection::Commits,
            &outputs,
            &CancelToken::new(),
            None,
        )
        .await;

    assert_eq!(reports.len(), 2);
    let gadgets = reports[0].outcome.as_ref().expect("tolerated");
    assert_eq!(gadgets.commits, 0);
    assert_eq!(gadgets.errors.len(), 1);
    let widgets = reports[1].outcome.as_ref().expect("succeeded");
    assert_eq!(widgets.commits, 2);
}

#[tokio::test]
async fn cancelled_token_stops_the_run_before_any_request() {
    let transport = fixture_transport();
    let crawler = crawler(&transport);
    let dir = tempfile::tempdir().expect("tempdir");
    let outputs = outputs(&dir);

    let cancel = CancelToken::new();
    cancel.cancel();

    let repos = vec!["acme/widgets".to_string(), "acme/gadgets".to_string()];
    let reports = crawler
        .crawl_all(&repos, Selection::All, &outputs, &cancel, None)
        .await;

    // The first repository fails with a cancellation and the run aborts.
    assert_eq!(reports.len(), 1);
    assert!(reports[0]
        .outcome
        .as_ref()
        .expect_err("cancelled")
        .is_cancelled());
    assert!(!outputs.commits.path().exists());
}
