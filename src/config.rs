//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.repostats.toml` files.

use crate::analysis::stats::{DEFAULT_GROWTH_DAYS, DEFAULT_TRAFFIC_DAYS};
use crate::github::GithubSettings;
use crate::pipeline::{RunSettings, DEFAULT_CONCURRENCY};
use crate::report::ReportSettings;
use crate::store::StoreSettings;
use crate::targets::{FileTargets, JsonTargets, StaticTargets, TargetSource};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".repostats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Repositories to cover.
    #[serde(default)]
    pub targets: TargetsConfig,

    /// GitHub API settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Artifact store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Number of concurrent fetches.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Stop starting fetches after the first failure.
    #[serde(default = "default_true")]
    pub fail_fast: bool,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fail_fast: true,
            verbose: false,
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_true() -> bool {
    true
}

/// Target list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetsConfig {
    /// Repositories in `owner/name` form.
    #[serde(default)]
    pub repos: Vec<String>,
}

/// GitHub API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries for rate-limited requests.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Longest wait before a rate-limit retry, in seconds.
    #[serde(default = "default_max_retry_wait")]
    pub max_retry_wait_seconds: u64,

    /// Page limit for stargazer and fork listings.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Page size for list endpoints.
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            max_retry_wait_seconds: default_max_retry_wait(),
            max_pages: default_max_pages(),
            per_page: default_per_page(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> usize {
    3
}

fn default_max_retry_wait() -> u64 {
    300
}

fn default_max_pages() -> usize {
    30
}

fn default_per_page() -> usize {
    100
}

/// Artifact store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Working copy path.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Clone URL used when the working copy is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Branch the working copy must have checked out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Directory inside the store for the dashboard.
    #[serde(default)]
    pub prefix: String,

    /// Remote to push to.
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Push after committing.
    #[serde(default = "default_true")]
    pub push: bool,

    #[serde(default = "default_author_name")]
    pub author_name: String,

    #[serde(default = "default_author_email")]
    pub author_email: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            url: None,
            branch: None,
            prefix: String::new(),
            remote: default_remote(),
            push: true,
            author_name: default_author_name(),
            author_email: default_author_email(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("gh-pages")
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_author_name() -> String {
    "repostats".to_string()
}

fn default_author_email() -> String {
    "repostats@users.noreply.github.com".to_string()
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Dashboard title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Traffic window in days.
    #[serde(default = "default_traffic_days")]
    pub traffic_days: u32,

    /// Star and fork growth window in days.
    #[serde(default = "default_growth_days")]
    pub growth_days: u32,

    /// Publish `stats.json`.
    #[serde(default = "default_true")]
    pub json: bool,

    /// Publish a `README.md` summary.
    #[serde(default = "default_true")]
    pub markdown: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            traffic_days: default_traffic_days(),
            growth_days: default_growth_days(),
            json: true,
            markdown: true,
        }
    }
}

fn default_title() -> String {
    "Repository Statistics".to_string()
}

fn default_traffic_days() -> u32 {
    DEFAULT_TRAFFIC_DAYS
}

fn default_growth_days() -> u32 {
    DEFAULT_GROWTH_DAYS
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref api_url) = args.api_url {
            self.github.api_url = api_url.clone();
        }
        if let Some(ref path) = args.store {
            self.store.path = path.clone();
        }
        if let Some(ref url) = args.store_url {
            self.store.url = Some(url.clone());
        }
        if let Some(ref prefix) = args.prefix {
            self.store.prefix = prefix.clone();
        }
        if let Some(ref branch) = args.branch {
            self.store.branch = Some(branch.clone());
        }

        // Flags always override
        if args.no_fail_fast {
            self.general.fail_fast = false;
        }
        if args.no_push {
            self.store.push = false;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Pick the target source: `--repos`, then `--targets-file`, then `[targets]`.
    pub fn target_source(&self, args: &crate::cli::Args) -> Box<dyn TargetSource> {
        if let Some(ref json) = args.repos {
            Box::new(JsonTargets(json.clone()))
        } else if let Some(ref path) = args.targets_file {
            Box::new(FileTargets(path.clone()))
        } else {
            Box::new(StaticTargets(self.targets.repos.clone()))
        }
    }

    pub fn run_settings(&self, show_progress: bool) -> RunSettings {
        RunSettings {
            concurrency: self.general.concurrency,
            fail_fast: self.general.fail_fast,
            show_progress,
        }
    }

    pub fn github_settings(&self, token: Option<String>) -> GithubSettings {
        GithubSettings {
            api_url: self.github.api_url.clone(),
            token,
            timeout_seconds: self.github.timeout_seconds,
            retries: self.github.retries,
            max_retry_wait: Duration::from_secs(self.github.max_retry_wait_seconds),
            per_page: self.github.per_page,
            max_pages: self.github.max_pages,
        }
    }

    pub fn store_settings(&self, token: Option<String>, show_progress: bool) -> StoreSettings {
        StoreSettings {
            path: self.store.path.clone(),
            url: self.store.url.clone(),
            branch: self.store.branch.clone(),
            prefix: self.store.prefix.clone(),
            remote: self.store.remote.clone(),
            push: self.store.push,
            token,
            author_name: self.store.author_name.clone(),
            author_email: self.store.author_email.clone(),
            show_progress,
        }
    }

    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            title: self.report.title.clone(),
            json: self.report.json,
            markdown: self.report.markdown,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
