//! Run lifecycle.
//!
//! `Init -> Fetching -> Analyzing -> Aggregating -> Publishing -> Done`, with
//! a transition to `Failed` available from every non-terminal phase. The
//! orchestrator is consumed by [`Orchestrator::run`], so one instance can
//! publish at most once.

use super::monitor::FailureMonitor;
use super::pool::WorkerPool;
use super::sequential::{SequenceOutcome, SequentialRunner};
use super::task::{PhaseResult, Task, TaskKind};
use super::{Aggregator, Analyzer, Fetcher, Publisher, DEFAULT_CONCURRENCY};
use crate::error::RunError;
use crate::models::{AggregateReport, PublishRecord, RepoSnapshot, RepoStats, Target};
use crate::targets::{parse_targets, TargetSource};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Coarse-grained stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Init,
    Fetching,
    Analyzing,
    Aggregating,
    Publishing,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }

    /// Whether `self -> next` is an edge of the run state machine.
    pub fn can_transition_to(self, next: Phase) -> bool {
        if next == Phase::Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Phase::Init, Phase::Fetching)
                | (Phase::Fetching, Phase::Analyzing)
                | (Phase::Analyzing, Phase::Aggregating)
                | (Phase::Aggregating, Phase::Publishing)
                | (Phase::Publishing, Phase::Done)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Fetching => "fetching",
            Phase::Analyzing => "analyzing",
            Phase::Aggregating => "aggregating",
            Phase::Publishing => "publishing",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Maximum concurrent fetches.
    pub concurrency: usize,
    /// Stop starting new fetches after the first failure.
    pub fail_fast: bool,
    /// Draw a progress bar during the fetch phase.
    pub show_progress: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            fail_fast: true,
            show_progress: false,
        }
    }
}

/// Everything that happened during one run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Phases entered, in order.
    pub phases: Vec<Phase>,
    /// Validated targets, in list order.
    pub targets: Vec<Target>,
    /// Fetch tasks, in completion order.
    pub fetch_tasks: Vec<Task<RepoSnapshot>>,
    /// Analyze tasks, in target order.
    pub analyze_tasks: Vec<Task<RepoStats>>,
    pub report: Option<AggregateReport>,
    pub publish: Option<PublishRecord>,
    /// The terminating cause, if the run failed.
    pub failure: Option<RunError>,
    /// Other failures observed in the failing phase.
    pub secondary_failures: Vec<RunError>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn final_phase(&self) -> Phase {
        self.phases.last().copied().unwrap_or(Phase::Init)
    }

    pub fn succeeded(&self) -> bool {
        self.final_phase() == Phase::Done
    }

    /// 0 on `Done`, otherwise the failure's exit code.
    pub fn exit_code(&self) -> i32 {
        match self.failure {
            Some(ref e) => e.exit_code(),
            None if self.succeeded() => 0,
            None => crate::error::EXIT_RUN_FAILED,
        }
    }
}

struct PhaseTracker {
    history: Vec<Phase>,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            history: vec![Phase::Init],
        }
    }

    fn current(&self) -> Phase {
        self.history.last().copied().unwrap_or(Phase::Init)
    }

    fn advance(&mut self, next: Phase) {
        let from = self.current();
        debug_assert!(
            from.can_transition_to(next),
            "invalid phase transition {} -> {}",
            from,
            next
        );
        info!(from = %from, to = %next, "Phase transition");
        self.history.push(next);
    }
}

/// Composes the pool, monitor, sequential runner and publisher into a run.
pub struct Orchestrator {
    source: Box<dyn TargetSource>,
    fetcher: Arc<dyn Fetcher>,
    analyzer: Arc<dyn Analyzer>,
    aggregator: Arc<dyn Aggregator>,
    publisher: Arc<dyn Publisher>,
    settings: RunSettings,
}

impl Orchestrator {
    pub fn new(
        source: Box<dyn TargetSource>,
        fetcher: Arc<dyn Fetcher>,
        analyzer: Arc<dyn Analyzer>,
        aggregator: Arc<dyn Aggregator>,
        publisher: Arc<dyn Publisher>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            fetcher,
            analyzer,
            aggregator,
            publisher,
            settings,
        }
    }

    /// Execute the run to a terminal phase.
    pub async fn run(self) -> RunSummary {
        let started = Instant::now();
        let mut tracker = PhaseTracker::new();
        let mut summary = RunSummary::default();

        if let Err(e) = self.drive(&mut tracker, &mut summary).await {
            debug!(phase = %tracker.current(), "Run terminated: {}", e);
            for secondary in &summary.secondary_failures {
                warn!("Secondary failure: {}", secondary);
            }
            tracker.advance(Phase::Failed);
            summary.failure = Some(e);
        }

        summary.phases = tracker.history;
        summary.duration = started.elapsed();
        summary
    }

    async fn drive(
        &self,
        tracker: &mut PhaseTracker,
        summary: &mut RunSummary,
    ) -> Result<(), RunError> {
        let targets = self.init()?;
        info!("Loaded {} targets from {}", targets.len(), self.source.describe());
        summary.targets = targets.clone();

        tracker.advance(Phase::Fetching);
        let fetched = self.fetch_all(&targets).await;
        let cause = fetched.cause().map(fetch_error);
        summary
            .secondary_failures
            .extend(fetched.secondary_failures().map(fetch_error));
        let all_succeeded = fetched.all_succeeded();
        summary.fetch_tasks = fetched.into_tasks();

        if let Some(cause) = cause {
            return Err(cause);
        }
        if !all_succeeded {
            return Err(RunError::Fetch {
                target: "<unknown>".to_string(),
                detail: "fetch phase did not complete".to_string(),
            });
        }

        let inputs = ordered_snapshots(&targets, &summary.fetch_tasks)?;

        tracker.advance(Phase::Analyzing);
        let analyzer = Arc::clone(&self.analyzer);
        let aggregator = Arc::clone(&self.aggregator);
        let outcome = SequentialRunner::new()
            .run(
                inputs,
                |target, snapshot| {
                    let analyzer = Arc::clone(&analyzer);
                    async move { analyzer.analyze(&target, &snapshot).await }
                },
                |stats| {
                    tracker.advance(Phase::Aggregating);
                    async move { aggregator.aggregate(&stats).await }
                },
            )
            .await;

        let report = match outcome {
            SequenceOutcome::Succeeded { tasks, output } => {
                summary.analyze_tasks = tasks;
                output
            }
            SequenceOutcome::StepFailed { tasks, at } => {
                let err = RunError::Analyze {
                    target: tasks[at].target().to_string(),
                    detail: tasks[at].error().unwrap_or("unknown error").to_string(),
                };
                summary.analyze_tasks = tasks;
                return Err(err);
            }
            SequenceOutcome::FinalFailed { tasks, detail } => {
                summary.analyze_tasks = tasks;
                return Err(RunError::Aggregate(detail));
            }
        };

        tracker.advance(Phase::Publishing);
        info!("Publishing report covering {} repositories", report.repos.len());
        let published = self.publisher.publish(&report).await;
        summary.report = Some(report);

        let record = published.map_err(|e| RunError::Publish(format!("{:#}", e)))?;
        match record.commit {
            Some(ref commit) => info!(commit = %commit, "Published"),
            None => info!("Published; artifact store already up to date"),
        }
        summary.publish = Some(record);

        tracker.advance(Phase::Done);
        Ok(())
    }

    fn init(&self) -> Result<Vec<Target>, RunError> {
        if self.settings.concurrency == 0 {
            return Err(RunError::Config(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let raw = self.source.load().map_err(|e| {
            RunError::Config(format!(
                "failed to load targets from {}: {:#}",
                self.source.describe(),
                e
            ))
        })?;

        parse_targets(raw)
    }

    async fn fetch_all(&self, targets: &[Target]) -> PhaseResult<RepoSnapshot> {
        let pool = WorkerPool::new(Arc::clone(&self.fetcher), self.settings.concurrency);
        debug!(
            concurrency = pool.concurrency(),
            fail_fast = self.settings.fail_fast,
            "Starting fetch phase"
        );

        let tasks = targets
            .iter()
            .cloned()
            .map(|t| Task::new(t, TaskKind::Fetch))
            .collect();

        let mut monitor = FailureMonitor::new(pool.cancellation_token(), self.settings.fail_fast);
        if self.settings.show_progress {
            monitor = monitor.with_progress(fetch_progress_bar(targets.len()));
        }

        monitor.observe(pool.submit(tasks)).await
    }
}

fn fetch_error(task: &Task<RepoSnapshot>) -> RunError {
    RunError::Fetch {
        target: task.target().to_string(),
        detail: task.error().unwrap_or("unknown error").to_string(),
    }
}

/// Pair each target with its snapshot, in target-list order.
fn ordered_snapshots(
    targets: &[Target],
    tasks: &[Task<RepoSnapshot>],
) -> Result<Vec<(Target, RepoSnapshot)>, RunError> {
    let by_target: HashMap<&Target, &RepoSnapshot> = tasks
        .iter()
        .filter_map(|t| t.output().map(|o| (t.target(), o)))
        .collect();

    targets
        .iter()
        .map(|target| {
            by_target
                .get(target)
                .map(|snapshot| (target.clone(), (*snapshot).clone()))
                .ok_or_else(|| RunError::Fetch {
                    target: target.to_string(),
                    detail: "no snapshot recorded".to_string(),
                })
        })
        .collect()
}

fn fetch_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} fetched",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    pb
}
