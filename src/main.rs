//! repostats - GitHub repository statistics aggregator
//!
//! A CLI tool that fetches traffic, star and fork statistics for a list of
//! repositories, renders an aggregate dashboard, and publishes it to a
//! git-backed artifact store.
//!
//! Exit codes:
//!   0 - Dashboard published
//!   1 - Run failed (fetch, analysis, aggregation or publish)
//!   2 - Configuration error (bad target list, config file, or arguments)

mod analysis;
mod cli;
mod config;
mod error;
mod github;
mod models;
mod pipeline;
mod report;
mod store;
mod targets;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE};
use error::{RunError, EXIT_CONFIG};
use github::GithubFetcher;
use pipeline::{Orchestrator, Publisher, RunSummary, TaskStatus};
use std::path::PathBuf;
use std::sync::Arc;
use store::{DirectoryPublisher, GitPublisher};
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(EXIT_CONFIG);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first; it can turn on verbose logging
    let (mut config, origin) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            let e = RunError::Config(format!("{:#}", e));
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(e.exit_code());
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(&args, config.general.verbose);

    info!("repostats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match origin {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    let exit_code = match run(args, config).await {
        Ok(summary) => {
            print_summary(&summary);
            summary.exit_code()
        }
        Err(e) => {
            let e = RunError::Config(format!("{:#}", e));
            eprintln!("\n❌ Error: {}", e);
            e.exit_code()
        }
    };

    std::process::exit(exit_code);
}

/// Handle --init-config: generate a default .repostats.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(EXIT_CONFIG);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to list repositories and configure the artifact store.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` overrides the level picked from `--verbose`/`--quiet` and the
/// config file.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = args.log_level(config_verbose);
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Build the collaborators from configuration and run once.
///
/// Errors returned here happen before the run starts and are configuration
/// errors; failures during the run are recorded in the summary.
async fn run(args: Args, config: Config) -> Result<RunSummary> {
    let show_progress = !args.quiet;
    let source = config.target_source(&args);
    info!(source = %source.describe(), "Loading targets");

    let fetcher = GithubFetcher::new(config.github_settings(args.token.clone()))?;
    let analyzer =
        analysis::StatsAnalyzer::new(config.report.traffic_days, config.report.growth_days);
    let aggregator = report::DashboardAggregator::new(config.report_settings());

    let publisher: Arc<dyn Publisher> = if args.dry_run {
        println!("🔍 Dry run: writing dashboard to {}", args.output.display());
        Arc::new(DirectoryPublisher::new(&args.output))
    } else {
        let settings = config.store_settings(args.token.clone(), show_progress);
        println!(
            "📦 Publishing to {}{}",
            settings.path.display(),
            if settings.push { "" } else { " (no push)" }
        );
        Arc::new(GitPublisher::new(settings))
    };

    println!(
        "📊 Collecting statistics (concurrency {}, fail-fast {})",
        config.general.concurrency,
        if config.general.fail_fast { "on" } else { "off" }
    );

    let orchestrator = Orchestrator::new(
        source,
        Arc::new(fetcher),
        Arc::new(analyzer),
        Arc::new(aggregator),
        publisher,
        config.run_settings(show_progress),
    );

    Ok(orchestrator.run().await)
}

/// Load configuration from file or use defaults, along with the file it came from.
fn load_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, Some(config_path.clone())));
    }

    // Try default location
    Ok(match Config::load_default()? {
        Some(config) => (config, Some(PathBuf::from(CONFIG_FILE))),
        None => (Config::default(), None),
    })
}

fn print_summary(summary: &RunSummary) {
    let fetched = summary
        .fetch_tasks
        .iter()
        .filter(|t| t.status() == TaskStatus::Succeeded)
        .count();
    let failed = summary
        .fetch_tasks
        .iter()
        .filter(|t| t.status() == TaskStatus::Failed)
        .count();
    let cancelled = summary
        .fetch_tasks
        .iter()
        .filter(|t| t.status() == TaskStatus::Cancelled)
        .count();

    println!("\n📊 Run Summary:");
    println!("   Targets: {}", summary.targets.len());
    println!(
        "   Fetched: {} | Failed: {} | Cancelled: {}",
        fetched, failed, cancelled
    );
    if let Some(ref report) = summary.report {
        println!(
            "   Active: {} | Crickets: {}",
            report.active.len(),
            report.crickets.len()
        );
    }
    println!("   Duration: {:.1}s", summary.duration.as_secs_f64());

    match (&summary.failure, &summary.publish) {
        (Some(failure), _) => {
            for line in failure_lines(summary, failure) {
                eprintln!("{}", line);
            }
        }
        (None, Some(record)) => match record.commit {
            Some(ref commit) => println!(
                "\n✅ Published {} files in commit {}{}",
                record.files.len(),
                &commit[..commit.len().min(8)],
                if record.pushed { " (pushed)" } else { "" }
            ),
            None => println!(
                "\n✅ Wrote {} files (nothing new to commit){}",
                record.files.len(),
                if record.pushed { ", pushed earlier commits" } else { "" }
            ),
        },
        (None, None) => {}
    }
}

/// Diagnostic lines for a failed run: the terminating cause once, then each
/// failed fetch task.
fn failure_lines(summary: &RunSummary, failure: &RunError) -> Vec<String> {
    let mut lines = vec![format!("\n❌ Run failed in {}: {}", failure.phase(), failure)];

    let failed_tasks = summary
        .fetch_tasks
        .iter()
        .filter(|t| t.exit_code() == Some(1));
    for task in failed_tasks {
        let elapsed = match (task.started_at(), task.finished_at()) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        };
        let marker = if failure.target() == Some(task.target().as_str()) {
            " (first failure)"
        } else {
            ""
        };
        lines.push(format!(
            "   ✗ {}{} after {:.1}s: {}",
            task.target(),
            marker,
            elapsed,
            task.error().unwrap_or_default()
        ));
    }

    lines
}
