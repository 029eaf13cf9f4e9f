//! Bounded pool for fetch tasks.
//!
//! Tasks are started lazily as slots free up, so at most `concurrency`
//! fetches are in flight at any moment. A task that reaches the front of the
//! queue after the pool's cancellation token fired is marked cancelled and
//! never reaches the fetcher.

use super::task::Task;
use super::Fetcher;
use crate::models::RepoSnapshot;
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs fetch tasks with a fixed concurrency ceiling.
pub struct WorkerPool {
    fetcher: Arc<dyn Fetcher>,
    concurrency: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Create a pool; a zero ceiling is raised to one.
    pub fn new(fetcher: Arc<dyn Fetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Token that stops unstarted tasks from running once cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Submit tasks; completed tasks are yielded in completion order.
    ///
    /// Nothing runs until the returned stream is polled.
    pub fn submit(
        &self,
        tasks: Vec<Task<RepoSnapshot>>,
    ) -> impl Stream<Item = Task<RepoSnapshot>> + Send + 'static {
        let fetcher = Arc::clone(&self.fetcher);
        let cancel = self.cancel.clone();

        stream::iter(tasks)
            .map(move |task| run_fetch(Arc::clone(&fetcher), cancel.clone(), task))
            .buffer_unordered(self.concurrency)
    }
}

async fn run_fetch(
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
    mut task: Task<RepoSnapshot>,
) -> Task<RepoSnapshot> {
    if cancel.is_cancelled() {
        task.cancel();
        debug!(repo = %task.target(), "fetch cancelled before start");
        return task;
    }

    task.start();
    debug!(repo = %task.target(), "fetch started");

    let result = fetcher.fetch(task.target()).await;
    task.finish(result);

    debug!(repo = %task.target(), status = %task.status(), "fetch finished");
    task
}
