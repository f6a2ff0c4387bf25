//! Configuration file support for githarvest.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `GITHARVEST_`, e.g., `GITHARVEST_GITHUB_TOKEN`)
//! 3. Config file (~/.config/githarvest/config.toml or ./githarvest.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use GITHARVEST_GITHUB_TOKEN env var
//! api_base = "https://api.github.com"  # optional, this is the default
//!
//! [crawl]
//! repositories = ["rust-lang/rust", "tokio-rs/tokio"]
//!
//! [output]
//! commits = "github_commits.csv"
//! issues = "github_issues.csv"
//! comments = "github_comments.csv"
//! overwrite = false
//! ```

use std::path::PathBuf;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// Default crawl options.
    pub crawl: CrawlConfig,
    /// Destination files.
    pub output: OutputConfig,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via GITHARVEST_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// API base URL, for GitHub Enterprise instances.
    pub api_base: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: githarvest::client::DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Default crawl options.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Repositories to crawl (`owner/name`), used when none are given on
    /// the command line.
    pub repositories: Vec<String>,
}

/// Destination files for each collection.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub commits: PathBuf,
    pub issues: PathBuf,
    pub comments: PathBuf,
    /// Truncate destinations before writing instead of appending.
    pub overwrite: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            commits: PathBuf::from("github_commits.csv"),
            issues: PathBuf::from("github_issues.csv"),
            comments: PathBuf::from("github_comments.csv"),
            overwrite: false,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/githarvest/config.toml)
    /// 3. Local config file (./githarvest.toml)
    /// 4. Environment variables with GITHARVEST_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "githarvest") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        // Local config file (higher priority than XDG)
        let local_config = PathBuf::from("githarvest.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./githarvest.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // GITHARVEST_ prefixed environment variables
        // e.g., GITHARVEST_GITHUB_TOKEN -> github.token
        builder = builder.add_source(
            Environment::with_prefix("GITHARVEST")
                .separator("_")
                .try_parsing(true),
        );

        // The `_` separator cannot reach a two-word key like
        // `github.api_base`, so that variable is applied explicitly.
        let api_base_env = std::env::var("GITHARVEST_GITHUB_API_BASE").ok();

        match builder
            .set_override_option("github.api_base", api_base_env)
            .and_then(|builder| builder.build())
        {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }
}
