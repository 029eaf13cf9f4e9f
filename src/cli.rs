//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// repostats - aggregate GitHub repository statistics into a dashboard
///
/// Fetches traffic, stars and forks for a list of repositories, renders an
/// aggregate dashboard and publishes it to a git-backed artifact store
/// (usually a gh-pages branch).
///
/// Examples:
///   repostats --repos '["octo/cat", "octo/dog"]'
///   repostats --targets-file repos.txt --store ./gh-pages --prefix stats
///   repostats --repos '["octo/cat"]' --dry-run -o dist
///   repostats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Repositories as a JSON array of "owner/name" strings
    #[arg(long, value_name = "JSON", env = "REPOSTATS_REPOS", conflicts_with = "targets_file")]
    pub repos: Option<String>,

    /// File listing one "owner/name" per line
    ///
    /// Blank lines and lines starting with '#' are ignored.
    #[arg(long, value_name = "FILE")]
    pub targets_file: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .repostats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum number of concurrent fetches
    #[arg(short = 'j', long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Keep fetching after a failure to report every failing repository
    ///
    /// The run still fails and nothing is published.
    #[arg(long)]
    pub no_fail_fast: bool,

    /// Working copy of the artifact store
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Clone URL for the artifact store, used when --store does not exist
    #[arg(long, value_name = "URL")]
    pub store_url: Option<String>,

    /// Directory inside the artifact store that receives the dashboard
    #[arg(long, value_name = "DIR")]
    pub prefix: Option<String>,

    /// Branch the artifact store must have checked out
    #[arg(short, long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Commit to the artifact store without pushing
    #[arg(long)]
    pub no_push: bool,

    /// GitHub token (needs push access for traffic data)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub API base URL
    #[arg(long, value_name = "URL", env = "GITHUB_API_URL")]
    pub api_url: Option<String>,

    /// Dry run: write the dashboard to --output instead of the artifact store
    #[arg(long)]
    pub dry_run: bool,

    /// Output directory for --dry-run
    #[arg(short, long, default_value = "dist", value_name = "DIR")]
    pub output: PathBuf,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .repostats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(ref path) = self.targets_file {
            if !path.is_file() {
                return Err(format!("Targets file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over `verbose = true` in the config file.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
