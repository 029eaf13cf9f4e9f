//! First-failure latch for the fetch phase.

use super::task::{PhaseResult, Task, TaskStatus};
use futures::{pin_mut, Stream, StreamExt};
use indicatif::ProgressBar;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drains a completion stream and latches the first failure.
///
/// With fail-fast on, the first failure cancels the pool's token so queued
/// tasks never start. Tasks already running finish normally and their
/// outcomes are kept, but they never replace the latched cause.
pub struct FailureMonitor {
    cancel: CancellationToken,
    fail_fast: bool,
    progress: Option<ProgressBar>,
}

impl FailureMonitor {
    pub fn new(cancel: CancellationToken, fail_fast: bool) -> Self {
        Self {
            cancel,
            fail_fast,
            progress: None,
        }
    }

    /// Tick `progress` once per completed task.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Consume the stream until it is exhausted.
    pub async fn observe<O, S>(self, completions: S) -> PhaseResult<O>
    where
        S: Stream<Item = Task<O>>,
    {
        pin_mut!(completions);

        let mut tasks = Vec::new();
        let mut cause = None;

        while let Some(task) = completions.next().await {
            if let Some(ref pb) = self.progress {
                pb.inc(1);
            }

            match task.status() {
                TaskStatus::Failed if cause.is_none() => {
                    warn!(
                        repo = %task.target(),
                        error = task.error().unwrap_or_default(),
                        "{} failed",
                        task.kind()
                    );
                    cause = Some(tasks.len());
                    if self.fail_fast && !self.cancel.is_cancelled() {
                        info!("Cancelling tasks that have not started yet");
                        self.cancel.cancel();
                    }
                }
                TaskStatus::Failed => {
                    warn!(
                        repo = %task.target(),
                        error = task.error().unwrap_or_default(),
                        "{} also failed",
                        task.kind()
                    );
                }
                TaskStatus::Cancelled => {
                    debug!(repo = %task.target(), "{} cancelled", task.kind());
                }
                _ => {}
            }

            tasks.push(task);
        }

        if let Some(pb) = self.progress {
            pb.finish_and_clear();
        }

        PhaseResult::new(tasks, cause)
    }
}
