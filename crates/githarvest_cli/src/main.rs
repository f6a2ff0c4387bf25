//! githarvest CLI - command-line interface for the repository-history crawler.

mod config;
mod report;
mod shutdown;

use std::time::Duration;

use clap::{Parser, Subcommand};
use console::Term;
use githarvest::{
    ApiClient, CancelToken, Crawler, CsvSink, OutputSet, ReqwestTransport, Selection,
};
use tracing_subscriber::EnvFilter;

use crate::report::LoggingReporter;

#[derive(Parser)]
#[command(name = "githarvest")]
#[command(version)]
#[command(about = "Crawl GitHub repository history into CSV files")]
#[command(
    long_about = "githarvest walks the commit, issue, and issue-comment history of GitHub \
repositories through the REST API and appends the records to CSV files. It \
re-checks the API request budget before every call and waits out exhausted \
budgets instead of failing."
)]
#[command(after_long_help = r#"EXAMPLES
    Crawl everything from two repositories:
        $ githarvest all rust-lang/rust tokio-rs/tokio

    Commits only, replacing any previous output:
        $ githarvest commits rust-lang/rust --overwrite

    Issues and their comments:
        $ githarvest comments rust-lang/rust

CONFIGURATION
    githarvest reads configuration from:
      1. ~/.config/githarvest/config.toml (or $XDG_CONFIG_HOME/githarvest/config.toml)
      2. ./githarvest.toml
      3. Environment variables (GITHARVEST_* prefix)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    GITHARVEST_GITHUB_TOKEN      GitHub personal access token
    GITHARVEST_GITHUB_API_BASE   API base URL (default: https://api.github.com)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl commit history (with per-commit line statistics)
    Commits {
        #[command(flatten)]
        opts: CrawlOptions,
    },
    /// Crawl issues (open and closed)
    Issues {
        #[command(flatten)]
        opts: CrawlOptions,
    },
    /// Crawl issue comments
    Comments {
        #[command(flatten)]
        opts: CrawlOptions,
    },
    /// Crawl commits, issues, and comments
    All {
        #[command(flatten)]
        opts: CrawlOptions,
    },
}

impl Commands {
    fn selection(&self) -> Selection {
        match self {
            Commands::Commits { .. } => Selection::Commits,
            Commands::Issues { .. } => Selection::Issues,
            Commands::Comments { .. } => Selection::Comments,
            Commands::All { .. } => Selection::All,
        }
    }

    fn opts(&self) -> &CrawlOptions {
        match self {
            Commands::Commits { opts }
            | Commands::Issues { opts }
            | Commands::Comments { opts }
            | Commands::All { opts } => opts,
        }
    }
}

/// Common crawl options shared across all subcommands.
#[derive(Debug, Clone, clap::Args)]
struct CrawlOptions {
    /// Repositories to crawl (owner/name); falls back to the config file
    repos: Vec<String>,

    /// Truncate destination files before writing instead of appending
    #[arg(short = 'o', long)]
    overwrite: bool,

    /// HTTP request timeout in seconds
    #[arg(short = 't', long, default_value_t = 30)]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("githarvest=info,githarvest_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = config::Config::load();
    let cli = Cli::parse();
    let opts = cli.command.opts().clone();
    let selection = cli.command.selection();

    let Some(token) = config.github.token.clone() else {
        eprintln!(
            "No GitHub token configured. Set GITHARVEST_GITHUB_TOKEN or add it to the config file."
        );
        std::process::exit(2);
    };

    let repos = if opts.repos.is_empty() {
        config.crawl.repositories.clone()
    } else {
        opts.repos.clone()
    };
    if repos.is_empty() {
        eprintln!("No repositories given. Pass owner/name arguments or configure [crawl] repositories.");
        std::process::exit(2);
    }

    let cancel = CancelToken::new();
    shutdown::setup_shutdown_handler(cancel.clone());

    let transport = ReqwestTransport::with_timeout(Duration::from_secs(opts.timeout))?;
    let client = ApiClient::new(std::sync::Arc::new(transport), token)
        .with_api_base(config.github.api_base.clone());
    let crawler = Crawler::new(client);

    let outputs = OutputSet {
        commits: CsvSink::new(&config.output.commits),
        issues: CsvSink::new(&config.output.issues),
        comments: CsvSink::new(&config.output.comments),
    };
    if opts.overwrite || config.output.overwrite {
        outputs.reset_selected(selection)?;
    }

    let reports = crawler
        .crawl_all(&repos, selection, &outputs, &cancel, Some(&LoggingReporter::callback()))
        .await;

    let term = Term::stdout();
    let mut failures = 0usize;
    let mut cancelled = false;
    for report in &reports {
        match &report.outcome {
            Ok(result) => {
                if term.is_term() {
                    term.write_line(&format!(
                        "{}: {} commits, {} issues, {} comments",
                        report.repository, result.commits, result.issues, result.comments
                    ))?;
                    for error in &result.errors {
                        term.write_line(&format!("  warning: {error}"))?;
                    }
                }
            }
            Err(err) if err.is_cancelled() => {
                cancelled = true;
                if term.is_term() {
                    term.write_line(&format!("{}: cancelled", report.repository))?;
                }
            }
            Err(err) => {
                failures += 1;
                if term.is_term() {
                    term.write_line(&format!("{}: failed: {err}", report.repository))?;
                }
            }
        }
    }

    if cancelled {
        std::process::exit(130);
    }
    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
